//! MQTT client of the SIM7000 application layer
use embassy_time::Timer;
use embedded_io_async::Write;

use super::types::{MqttState, QoS};
use crate::client::{format_cmd, AtHandle, Terminator};
use crate::config::UplinkConfig;
use crate::csv::CsvRecord;
use crate::error::Error;
use crate::line::Line;
use crate::module_timing::{cmd_timeout, mqtt_poll_interval, MQTT_CONNECT_RETRIES};

impl<W: Write> AtHandle<'_, W> {
    /// Activate the application network and connect to the configured broker.
    pub async fn mqtt_connect(&self, config: &UplinkConfig) -> Result<(), Error> {
        let broker = &config.broker;
        self.execute_ok(format_cmd(format_args!("AT+CNACT=1,\"{}\"", config.apn.name))?.as_str())
            .await?;
        self.execute_ok(
            format_cmd(format_args!("AT+SMCONF=\"CLIENTID\",{}", config.client_id))?.as_str(),
        )
        .await?;
        self.execute_ok(
            format_cmd(format_args!(
                "AT+SMCONF=\"URL\",\"{}\",\"{}\"",
                broker.host, broker.port
            ))?
            .as_str(),
        )
        .await?;
        self.execute_ok(
            format_cmd(format_args!("AT+SMCONF=\"USERNAME\",\"{}\"", broker.username))?.as_str(),
        )
        .await?;
        self.execute_ok(
            format_cmd(format_args!("AT+SMCONF=\"PASSWORD\",\"{}\"", broker.password))?.as_str(),
        )
        .await?;
        self.execute_ok("AT+SMCONF=\"KEEPTIME\",60").await?;
        self.execute_ok("AT+SMCONF=\"RETAIN\",1").await?;
        self.execute_ok("AT+SMCONN").await?;
        Ok(())
    }

    /// `+SMSTATE: <status>`
    pub async fn mqtt_getconnstatus(&self) -> Result<CsvRecord, Error> {
        self.query("AT+SMSTATE?", "+SMSTATE").await
    }

    /// `+CNACT: <status>,<ip_addr>`
    pub async fn mqtt_getappstatus(&self) -> Result<CsvRecord, Error> {
        self.query("AT+CNACT?", "+CNACT").await
    }

    /// Poll the connection state until the broker session is online.
    pub async fn wait_for_mqtt_online(&self) -> Result<(), Error> {
        for _ in 0..=MQTT_CONNECT_RETRIES {
            Timer::after(mqtt_poll_interval()).await;
            let state: u8 = self.mqtt_getconnstatus().await?.parse(0)?;
            if MqttState::from_u8(state) == Some(MqttState::Online) {
                return Ok(());
            }
            debug!(target: self.log().target(), "MQTT state {}, waiting", state);
        }

        warn!(target: self.log().target(), "Can not connect to MQTT");
        Err(Error::Connect)
    }

    pub async fn mqtt_pub(
        &self,
        topic: &str,
        msg: &str,
        qos: QoS,
        retain: bool,
    ) -> Result<(), Error> {
        let header = format_cmd(format_args!(
            "AT+SMPUB=\"{}\",{},{},{}",
            topic,
            msg.len(),
            qos as u8,
            retain as u8
        ))?;

        let mut payload = alloc::vec::Vec::with_capacity(msg.len() + 2);
        payload.extend_from_slice(msg.as_bytes());
        payload.extend_from_slice(b"\r\n");

        self.execute_with_payload(header.as_str(), &payload).await
    }

    /// Subscribe to `topic`, dropping any stale subscription first.
    pub async fn mqtt_sub(&self, topic: &str, qos: QoS) -> Result<(), Error> {
        self.execute(
            format_cmd(format_args!("AT+SMUNSUB=\"{}\"", topic))?.as_str(),
            Terminator::AnyOf(&["OK", "ERROR"]),
            cmd_timeout(),
        )
        .await?;
        self.execute_ok(format_cmd(format_args!("AT+SMSUB=\"{}\",{}", topic, qos as u8))?.as_str())
            .await?;
        Ok(())
    }

    pub async fn mqtt_unsub(&self, topic: &str) -> Result<(), Error> {
        self.execute_ok(format_cmd(format_args!("AT+SMUNSUB=\"{}\"", topic))?.as_str())
            .await?;
        Ok(())
    }

    pub async fn mqtt_disconnect(&self) -> Result<(), Error> {
        self.execute_ok("AT+SMDISC").await?;
        self.execute_ok("AT+CNACT=0").await?;
        Ok(())
    }

    /// Next inbound message line, `+SMSUB: "<topic>","<payload>"`
    pub async fn mqtt_getmsg(&self) -> Line {
        self.next_unsolicited().await
    }
}
