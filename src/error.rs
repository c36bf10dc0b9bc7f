use embassy_time::TimeoutError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum Error {
    // Protocol errors
    /// No terminator line arrived before the transaction deadline.
    Timeout,
    /// An expected keyed reply line was absent or malformed.
    ProtocolParse,

    // Lifecycle errors
    /// The modem did not register to its home network in time.
    RegistrationTimeout,
    /// The MQTT connection never reached the online state.
    Connect,
    /// Too many consecutive publish cycles failed.
    PublishCycle,

    // Device errors
    /// No serial link is attached, the modem is down.
    Uninitialized,
    Write,
    Read,
    /// The UART could not be opened.
    Serial,
    IoPin,

    /// A command, topic or payload did not fit or could not be encoded.
    Encode,
}

impl Error {
    /// Whether a fresh lifecycle attempt can be expected to clear the error.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Encode)
    }
}

impl From<TimeoutError> for Error {
    fn from(_: TimeoutError) -> Self {
        Self::Timeout
    }
}

impl From<serde_json::Error> for Error {
    fn from(_: serde_json::Error) -> Self {
        Self::Encode
    }
}
