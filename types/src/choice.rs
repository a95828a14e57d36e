// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Closed enumerations of registry choice fields
//!
//! The registry renders a choice field as `{"value": "active", "label":
//! "Active"}` on read and accepts the bare value on write.  Every choice type
//! here deserializes from either shape and serializes to the bare value.

use serde::de::Error as _;
use serde::Deserialize;
use serde::Deserializer;

/// Behavior shared by every choice enumeration.
pub trait Choice: Copy + Sized + 'static {
    /// Every member, in declaration order.
    const ALL: &'static [Self];

    /// Value written to the registry.
    fn value(&self) -> &'static str;

    /// Human-readable label the registry renders next to the value.
    fn label(&self) -> &'static str;

    fn from_value(value: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.value() == value)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ChoiceRepr {
    Bare(String),
    Labeled { value: String },
}

/// Deserializes a choice from either its bare value or its `{value, label}`
/// rendering.
pub fn deserialize<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Choice,
{
    let value = match ChoiceRepr::deserialize(deserializer)? {
        ChoiceRepr::Bare(value) => value,
        ChoiceRepr::Labeled { value } => value,
    };
    T::from_value(&value).ok_or_else(|| {
        D::Error::custom(format!(
            "unknown {} value {:?}",
            std::any::type_name::<T>(),
            value
        ))
    })
}

/// Defines a choice enumeration with its registry values and labels.
macro_rules! choice {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $(
                $(#[$vmeta:meta])*
                $variant:ident => ($value:literal, $label:literal),
            )+
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord,
        )]
        pub enum $name {
            $(
                $(#[$vmeta])*
                $variant,
            )+
        }

        impl $crate::choice::Choice for $name {
            const ALL: &'static [Self] = &[$(Self::$variant),+];

            fn value(&self) -> &'static str {
                match self {
                    $(Self::$variant => $value,)+
                }
            }

            fn label(&self) -> &'static str {
                match self {
                    $(Self::$variant => $label,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str($crate::choice::Choice::value(self))
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::choice::UnknownChoice;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                <Self as $crate::choice::Choice>::from_value(s).ok_or_else(
                    || $crate::choice::UnknownChoice {
                        choice: stringify!($name),
                        value: s.to_owned(),
                    },
                )
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(
                &self,
                serializer: S,
            ) -> Result<S::Ok, S::Error> {
                serializer
                    .serialize_str($crate::choice::Choice::value(self))
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(
                deserializer: D,
            ) -> Result<Self, D::Error> {
                $crate::choice::deserialize(deserializer)
            }
        }
    };
}

pub(crate) use choice;

#[derive(Debug, Clone, thiserror::Error)]
#[error("{value:?} is not a valid {choice}")]
pub struct UnknownChoice {
    pub choice: &'static str,
    pub value: String,
}

choice! {
    pub enum SiteStatus {
        Planned => ("planned", "Planned"),
        Staging => ("staging", "Staging"),
        #[default]
        Active => ("active", "Active"),
        Decommissioning => ("decommissioning", "Decommissioning"),
        Retired => ("retired", "Retired"),
    }
}

choice! {
    pub enum ClusterStatus {
        Planned => ("planned", "Planned"),
        Staging => ("staging", "Staging"),
        #[default]
        Active => ("active", "Active"),
        Decommissioning => ("decommissioning", "Decommissioning"),
        Offline => ("offline", "Offline"),
    }
}

choice! {
    pub enum DeviceStatus {
        Offline => ("offline", "Offline"),
        #[default]
        Active => ("active", "Active"),
        Planned => ("planned", "Planned"),
        Staged => ("staged", "Staged"),
        Failed => ("failed", "Failed"),
        Inventory => ("inventory", "Inventory"),
        Decommissioning => ("decommissioning", "Decommissioning"),
    }
}

choice! {
    pub enum VmStatus {
        Offline => ("offline", "Offline"),
        #[default]
        Active => ("active", "Active"),
        Planned => ("planned", "Planned"),
        Staged => ("staged", "Staged"),
        Failed => ("failed", "Failed"),
        Decommissioning => ("decommissioning", "Decommissioning"),
    }
}

choice! {
    pub enum VdcStatus {
        #[default]
        Active => ("active", "Active"),
        Planned => ("planned", "Planned"),
        Offline => ("offline", "Offline"),
    }
}

choice! {
    pub enum VlanStatus {
        #[default]
        Active => ("active", "Active"),
        Reserved => ("reserved", "Reserved"),
        Deprecated => ("deprecated", "Deprecated"),
    }
}

choice! {
    pub enum PrefixStatus {
        Container => ("container", "Container"),
        #[default]
        Active => ("active", "Active"),
        Reserved => ("reserved", "Reserved"),
        Deprecated => ("deprecated", "Deprecated"),
    }
}

choice! {
    pub enum IpStatus {
        #[default]
        Active => ("active", "Active"),
        Reserved => ("reserved", "Reserved"),
        Deprecated => ("deprecated", "Deprecated"),
        Dhcp => ("dhcp", "DHCP"),
        Slaac => ("slaac", "SLAAC"),
    }
}

choice! {
    pub enum IpRole {
        #[default]
        Loopback => ("loopback", "Loopback"),
        Secondary => ("secondary", "Secondary"),
        Anycast => ("anycast", "Anycast"),
        Vip => ("vip", "VIP"),
        Vrrp => ("vrrp", "VRRP"),
        Hsrp => ("hsrp", "HSRP"),
        Glbp => ("glbp", "GLBP"),
        Carp => ("carp", "CARP"),
    }
}

choice! {
    pub enum InterfaceMode {
        #[default]
        Access => ("access", "Access"),
        Tagged => ("tagged", "Tagged"),
        TaggedAll => ("tagged-all", "Tagged (All)"),
    }
}

choice! {
    /// Physical or logical interface types.  Only the subset the sources
    /// report is listed.
    pub enum InterfaceType {
        Virtual => ("virtual", "Virtual"),
        Bridge => ("bridge", "Bridge"),
        Lag => ("lag", "Link Aggregation Group (LAG)"),
        Base100Tx => ("100base-tx", "100BASE-TX (10/100ME)"),
        Base1000T => ("1000base-t", "1000BASE-T (1GE)"),
        Base2G5T => ("2.5gbase-t", "2.5GBASE-T (2.5GE)"),
        Base5GT => ("5gbase-t", "5GBASE-T (5GE)"),
        Base10GT => ("10gbase-t", "10GBASE-T (10GE)"),
        Base1000XSfp => ("1000base-x-sfp", "SFP (1GE)"),
        Base10GXSfpp => ("10gbase-x-sfpp", "SFP+ (10GE)"),
        Base25GXSfp28 => ("25gbase-x-sfp28", "SFP28 (25GE)"),
        Base40GXQsfpp => ("40gbase-x-qsfpp", "QSFP+ (40GE)"),
        Base50GXSfp56 => ("50gbase-x-sfp56", "SFP56 (50GE)"),
        Base100GXQsfp28 => ("100gbase-x-qsfp28", "QSFP28 (100GE)"),
        Base200GXQsfp56 => ("200gbase-x-qsfp56", "QSFP56 (200GE)"),
        Base400GXQsfpdd => ("400gbase-x-qsfpdd", "QSFP-DD (400GE)"),
        Ieee80211ac => ("ieee802.11ac", "IEEE 802.11ac"),
        Ieee80211ax => ("ieee802.11ax", "IEEE 802.11ax"),
        #[default]
        Other => ("other", "Other"),
    }
}

impl InterfaceType {
    /// Best copper/optical guess for a physical port of the given speed.
    pub fn from_speed_kbps(speed: u64) -> InterfaceType {
        match speed {
            100_000 => InterfaceType::Base100Tx,
            1_000_000 => InterfaceType::Base1000T,
            2_500_000 => InterfaceType::Base2G5T,
            5_000_000 => InterfaceType::Base5GT,
            10_000_000 => InterfaceType::Base10GXSfpp,
            25_000_000 => InterfaceType::Base25GXSfp28,
            40_000_000 => InterfaceType::Base40GXQsfpp,
            50_000_000 => InterfaceType::Base50GXSfp56,
            100_000_000 => InterfaceType::Base100GXQsfp28,
            200_000_000 => InterfaceType::Base200GXQsfp56,
            400_000_000 => InterfaceType::Base400GXQsfpdd,
            _ => InterfaceType::Other,
        }
    }
}

choice! {
    pub enum CustomFieldType {
        #[default]
        Text => ("text", "Text"),
        LongText => ("longtext", "Text (long)"),
        Integer => ("integer", "Integer"),
        Decimal => ("decimal", "Decimal"),
        Boolean => ("boolean", "Boolean (true/false)"),
        Date => ("date", "Date"),
        DateTime => ("datetime", "Date & time"),
        Url => ("url", "URL"),
        Json => ("json", "JSON"),
    }
}

choice! {
    pub enum CustomFieldFilterLogic {
        Disabled => ("disabled", "Disabled"),
        #[default]
        Loose => ("loose", "Loose"),
        Exact => ("exact", "Exact"),
    }
}

choice! {
    pub enum CustomFieldUiVisible {
        #[default]
        Always => ("always", "Always"),
        IfSet => ("if-set", "If set"),
        Hidden => ("hidden", "Hidden"),
    }
}

choice! {
    pub enum CustomFieldUiEditable {
        #[default]
        Yes => ("yes", "Yes"),
        No => ("no", "No"),
        Hidden => ("hidden", "Hidden"),
    }
}
