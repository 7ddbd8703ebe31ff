//! The persisted device record.
//!
//! One record describes the single wake target, who may operate it, and
//! which chat message currently renders its status. The JSON layout is
//! flat; unset address and password fields are stored as empty strings.
//! Addresses are written back exactly as they were given, so loading and
//! saving an existing file never rewrites it.

use std::fmt;
use std::net::IpAddr;

use protocol::{parse_ip_address, ChannelId, Credential, MacAddress, MessageId, ProtocolError, UserId};
use serde::de::value::StringDeserializer;
use serde::de::IntoDeserializer;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Location of the live status display: one message in one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayBinding {
    /// Channel hosting the display.
    pub channel_id: ChannelId,
    /// Message rendering the display.
    pub message_id: MessageId,
}

/// Everything needed to wake and probe the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WakeTarget {
    /// Hardware address the magic packet is built for.
    pub mac_address: MacAddress,
    /// Address the reachability probe is sent to.
    pub ip_address: IpAddr,
    /// Secret the caller must present before a packet is sent.
    pub credential: Credential,
}

/// Validated `init` input, keeping the address text as the user typed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provisioning {
    mac_address: Spelled<MacAddress>,
    ip_address: Spelled<IpAddr>,
    credential: Credential,
}

impl Provisioning {
    /// Parses all three inputs; nothing is kept if any of them is invalid.
    pub fn parse(mac: &str, ip: &str, password: &str) -> Result<Self, ProtocolError> {
        Ok(Self {
            mac_address: Spelled::new(mac.trim(), MacAddress::parse(mac)?),
            ip_address: Spelled::new(ip.trim(), parse_ip_address(ip)?),
            credential: Credential::new(password)?,
        })
    }

    /// The parsed target.
    pub fn target(&self) -> WakeTarget {
        WakeTarget {
            mac_address: self.mac_address.value,
            ip_address: self.ip_address.value,
            credential: self.credential.clone(),
        }
    }
}

impl From<WakeTarget> for Provisioning {
    /// Uses the canonical spelling of each address.
    fn from(target: WakeTarget) -> Self {
        Self {
            mac_address: Spelled::canonical(target.mac_address),
            ip_address: Spelled::canonical(target.ip_address),
            credential: target.credential,
        }
    }
}

/// A parsed value together with the text it was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Spelled<T> {
    text: String,
    value: T,
}

impl<T> Spelled<T> {
    fn new(text: impl Into<String>, value: T) -> Self {
        Self {
            text: text.into(),
            value,
        }
    }
}

impl<T: fmt::Display> Spelled<T> {
    fn canonical(value: T) -> Self {
        Self::new(value.to_string(), value)
    }
}

impl<T> Serialize for Spelled<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.text)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Spelled<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        let inner: StringDeserializer<D::Error> = text.clone().into_deserializer();
        let value = T::deserialize(inner)?;
        Ok(Self { text, value })
    }
}

/// The persisted singleton.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeviceRecord {
    #[serde(default, with = "blank_as_none")]
    mac_address: Option<Spelled<MacAddress>>,

    #[serde(default, with = "blank_as_none")]
    ip_address: Option<Spelled<IpAddr>>,

    #[serde(rename = "password", default, with = "blank_as_none")]
    credential: Option<Credential>,

    #[serde(default)]
    user_ids: Vec<UserId>,

    #[serde(default)]
    text_channel_id: Option<ChannelId>,

    #[serde(default)]
    message_id: Option<MessageId>,
}

impl DeviceRecord {
    /// Returns the wake target if the device has been initialized.
    ///
    /// The three target fields are only ever written together, so this is
    /// `Some` exactly when all of them are set.
    pub fn target(&self) -> Option<WakeTarget> {
        match (&self.mac_address, &self.ip_address, &self.credential) {
            (Some(mac), Some(ip), Some(credential)) => Some(WakeTarget {
                mac_address: mac.value,
                ip_address: ip.value,
                credential: credential.clone(),
            }),
            _ => None,
        }
    }

    /// Returns the hardware address, if set.
    pub fn mac_address(&self) -> Option<&MacAddress> {
        self.mac_address.as_ref().map(|mac| &mac.value)
    }

    /// Returns the network address, if set.
    pub fn ip_address(&self) -> Option<IpAddr> {
        self.ip_address.as_ref().map(|ip| ip.value)
    }

    /// Returns the credential, if set.
    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    /// (Re-)provisions the record.
    ///
    /// Replaces the whole target and resets the authorized users to the
    /// caller alone. The display binding is left as it is.
    pub fn provision(&mut self, input: impl Into<Provisioning>, owner: UserId) {
        let input = input.into();
        self.mac_address = Some(input.mac_address);
        self.ip_address = Some(input.ip_address);
        self.credential = Some(input.credential);
        self.user_ids = vec![owner];
    }

    /// Users allowed to operate the device, in the order they were added.
    pub fn authorized_users(&self) -> &[UserId] {
        &self.user_ids
    }

    /// Checks whether the user is on the authorization list.
    pub fn is_authorized(&self, user: UserId) -> bool {
        self.user_ids.contains(&user)
    }

    /// Adds a user. Returns `false` if the user was already present.
    pub fn add_user(&mut self, user: UserId) -> bool {
        if self.is_authorized(user) {
            return false;
        }
        self.user_ids.push(user);
        true
    }

    /// Removes a user. Returns `false` if the user was not present.
    pub fn remove_user(&mut self, user: UserId) -> bool {
        let before = self.user_ids.len();
        self.user_ids.retain(|u| *u != user);
        self.user_ids.len() != before
    }

    /// Returns the display binding when both halves are present.
    pub fn binding(&self) -> Option<DisplayBinding> {
        match (self.text_channel_id, self.message_id) {
            (Some(channel_id), Some(message_id)) => Some(DisplayBinding {
                channel_id,
                message_id,
            }),
            _ => None,
        }
    }

    /// Replaces the display binding.
    pub fn set_binding(&mut self, binding: DisplayBinding) {
        self.text_channel_id = Some(binding.channel_id);
        self.message_id = Some(binding.message_id);
    }
}

/// Serde adapter mapping `None` to `""` and back.
mod blank_as_none {
    use serde::de::{value::StringDeserializer, IntoDeserializer};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<T, S>(value: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Serialize,
        S: Serializer,
    {
        match value {
            Some(v) => v.serialize(serializer),
            None => serializer.serialize_str(""),
        }
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        if raw.is_empty() {
            return Ok(None);
        }
        let inner: StringDeserializer<D::Error> = raw.into_deserializer();
        T::deserialize(inner).map(Some)
    }
}
