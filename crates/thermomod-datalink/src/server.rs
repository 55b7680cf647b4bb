use crate::DataLinkError;
use std::io::ErrorKind;
use std::sync::Arc;
use thermomod_core::DecodeError;
use thermomod_core::encoding::{Reader, Writer};
use thermomod_core::frame::tcp::{MAX_PDU_LEN, MBAP_HEADER_LEN, MbapHeader, encode_frame};
use thermomod_core::pdu::{DecodedRequest, ExceptionCode, ExceptionResponse};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tracing::{debug, trace, warn};

/// Why a service declined a request. Each variant is answered with an
/// exception response.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("exception: {0}")]
    Exception(ExceptionCode),
    #[error("invalid request: {0}")]
    InvalidRequest(&'static str),
    #[error("device fault: {0}")]
    Internal(&'static str),
}

impl From<&ServiceError> for ExceptionCode {
    fn from(err: &ServiceError) -> Self {
        match err {
            ServiceError::Exception(code) => *code,
            ServiceError::InvalidRequest(_) => ExceptionCode::IllegalDataValue,
            ServiceError::Internal(_) => ExceptionCode::ServerDeviceFailure,
        }
    }
}

fn decode_exception(err: DecodeError) -> ExceptionCode {
    match err {
        DecodeError::InvalidFunctionCode | DecodeError::Unsupported(_) => {
            ExceptionCode::IllegalFunction
        }
        _ => ExceptionCode::IllegalDataValue,
    }
}

/// Device behaviour behind a [`ModbusTcpServer`].
pub trait ModbusService: Send + Sync + 'static {
    /// Answer `request` by writing a response PDU (function code and payload,
    /// no MBAP header) into `response_pdu`. Returns the bytes written.
    fn handle(
        &self,
        unit_id: u8,
        request: DecodedRequest,
        response_pdu: &mut [u8],
    ) -> Result<usize, ServiceError>;
}

impl<T> ModbusService for Arc<T>
where
    T: ModbusService + ?Sized,
{
    fn handle(
        &self,
        unit_id: u8,
        request: DecodedRequest,
        response_pdu: &mut [u8],
    ) -> Result<usize, ServiceError> {
        T::handle(self, unit_id, request, response_pdu)
    }
}

pub struct ModbusTcpServer<S> {
    listener: TcpListener,
    service: Arc<S>,
}

impl<S: ModbusService> ModbusTcpServer<S> {
    pub async fn bind<A: ToSocketAddrs>(addr: A, service: S) -> Result<Self, DataLinkError> {
        Ok(Self::from_listener(TcpListener::bind(addr).await?, service))
    }

    pub fn from_listener(listener: TcpListener, service: S) -> Self {
        Self {
            listener,
            service: Arc::new(service),
        }
    }

    pub fn local_addr(&self) -> Result<std::net::SocketAddr, DataLinkError> {
        self.listener.local_addr().map_err(DataLinkError::Io)
    }

    /// Accept clients forever, one task per connection.
    pub async fn run(self) -> Result<(), DataLinkError> {
        loop {
            let (socket, peer) = self.listener.accept().await?;
            debug!(%peer, "client connected");
            let service = Arc::clone(&self.service);
            tokio::spawn(async move {
                match serve_client(socket, service.as_ref()).await {
                    Ok(()) => debug!(%peer, "client disconnected"),
                    Err(err) => warn!(%peer, error = %err, "client connection failed"),
                }
            });
        }
    }
}

/// Build the response PDU for one raw request PDU. Failures become an
/// exception response, so something is always written.
fn respond<S: ModbusService>(service: &S, unit_id: u8, request: &[u8], out: &mut [u8]) -> usize {
    let function = request.first().map_or(0, |code| code & 0x7F);
    let outcome = DecodedRequest::decode(request)
        .map_err(decode_exception)
        .and_then(|decoded| match service.handle(unit_id, decoded, out) {
            Ok(len) if (1..=out.len()).contains(&len) => Ok(len),
            Ok(_) => Err(ExceptionCode::ServerDeviceFailure),
            Err(err) => {
                debug!(unit_id, error = %err, "request rejected");
                Err(ExceptionCode::from(&err))
            }
        });

    outcome.unwrap_or_else(|exception_code| {
        let mut writer = Writer::new(out);
        let response = ExceptionResponse {
            function_code: function,
            exception_code,
        };
        match response.encode(&mut writer) {
            Ok(()) => writer.as_written().len(),
            Err(_) => 0,
        }
    })
}

async fn serve_client<S: ModbusService>(
    mut socket: TcpStream,
    service: &S,
) -> Result<(), DataLinkError> {
    let mut request = [0u8; MAX_PDU_LEN];
    let mut response = [0u8; MAX_PDU_LEN];
    let mut frame = [0u8; MBAP_HEADER_LEN + MAX_PDU_LEN];

    loop {
        let mut head = [0u8; MBAP_HEADER_LEN];
        match socket.read_exact(&mut head).await {
            Ok(_) => {}
            Err(err) if err.kind() == ErrorKind::UnexpectedEof => return Ok(()),
            Err(err) => return Err(DataLinkError::Io(err)),
        }
        let header = MbapHeader::decode(&mut Reader::new(&head))?;
        let pdu_len = header.pdu_len();
        if pdu_len > MAX_PDU_LEN {
            return Err(DataLinkError::InvalidResponse("request pdu too large"));
        }
        socket.read_exact(&mut request[..pdu_len]).await?;
        trace!(
            transaction_id = header.transaction_id,
            unit_id = header.unit_id,
            len = pdu_len,
            "request"
        );

        let len = respond(service, header.unit_id, &request[..pdu_len], &mut response);
        let mut writer = Writer::new(&mut frame);
        encode_frame(&mut writer, header.transaction_id, header.unit_id, &response[..len])?;
        socket.write_all(writer.as_written()).await?;
    }
}
