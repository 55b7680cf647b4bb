pub mod exception;
pub mod function_code;
pub mod request;
pub mod response;

pub use exception::{ExceptionCode, ExceptionResponse};
pub use function_code::FunctionCode;
pub use request::{DecodedRequest, MAX_READ_REGISTERS, ReadHoldingRegistersRequest};
pub use response::{ReadHoldingRegistersResponse, Response};
