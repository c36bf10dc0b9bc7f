//! Argument and parameter types used by the SIM7000 command templates

/// Network registration status, field 1 of `+CREG`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegistrationStat {
    /// • 0: not registered, the MT is not currently searching a new operator to register to
    NotRegistered = 0,
    /// • 1: registered, home network
    Registered = 1,
    /// • 2: not registered, but the MT is currently searching a new operator to register to
    NotRegisteredSearching = 2,
    /// • 3: registration denied
    RegistrationDenied = 3,
    /// • 4: unknown
    Unknown = 4,
    /// • 5: registered, roaming
    RegisteredRoaming = 5,
}

impl From<u8> for RegistrationStat {
    fn from(v: u8) -> Self {
        match v {
            0 => Self::NotRegistered,
            1 => Self::Registered,
            2 => Self::NotRegisteredSearching,
            3 => Self::RegistrationDenied,
            5 => Self::RegisteredRoaming,
            _ => Self::Unknown,
        }
    }
}

/// MQTT connection state, field 0 of `+SMSTATE`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MqttState {
    Offline = 0,
    Online = 1,
}

impl MqttState {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Offline),
            1 => Some(Self::Online),
            _ => None,
        }
    }
}

/// MQTT delivery guarantee
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum QoS {
    #[default]
    AtMostOnce = 0,
    AtLeastOnce = 1,
    ExactlyOnce = 2,
}
