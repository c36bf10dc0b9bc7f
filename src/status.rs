use embedded_io_async::Write;
use serde::Serialize;

use crate::client::AtHandle;
use crate::csv::CsvRecord;
use crate::error::Error;

/// Snapshot of the uplink, as reported by `Control::get_status` and published
/// to `<device>/status`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UplinkStatus {
    pub running: bool,
    pub restarts: u32,
    /// Serving cell, `+CPSI`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connected: Option<CsvRecord>,
    /// Signal quality, `+CSQ`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal: Option<CsvRecord>,
    /// Application network, `+CNACT`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app: Option<CsvRecord>,
    /// MQTT session, `+SMSTATE`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mqtt: Option<CsvRecord>,
}

impl UplinkStatus {
    /// Query the modem fields while the uplink runs with a link attached.
    /// Each field is queried on its own; a failed query leaves it empty.
    pub(crate) async fn collect<W: Write>(running: bool, restarts: u32, at: &AtHandle<'_, W>) -> Self {
        let mut status = Self {
            running,
            restarts,
            ..Default::default()
        };
        if !running || !at.is_attached().await {
            return status;
        }

        let target = at.log().target();
        let field = |name: &str, res: Result<CsvRecord, Error>| match res {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(target: target, "Failed to query status field {}: {:?}", name, e);
                None
            }
        };

        status.connected = field("connected", at.get_netinfo().await);
        status.signal = field("signal", at.get_signalinfo().await);
        status.app = field("app", at.mqtt_getappstatus().await);
        status.mqtt = field("mqtt", at.mqtt_getconnstatus().await);
        status
    }
}
