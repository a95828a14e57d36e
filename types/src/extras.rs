// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Tags and custom fields

use crate::choice::CustomFieldFilterLogic;
use crate::choice::CustomFieldType;
use crate::choice::CustomFieldUiEditable;
use crate::choice::CustomFieldUiVisible;
use crate::kind::ObjectKind;
use crate::record::Base;
use crate::record::ObjectRef;
use crate::record::Record;
use crate::refs;
use chrono::DateTime;
use chrono::NaiveDate;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tag {
    #[serde(skip_serializing_if = "refs::is_unset")]
    pub id: i64,
    pub name: String,
    pub slug: String,
    /// Six lowercase hex digits, without a leading `#`.
    pub color: String,
    #[serde(deserialize_with = "refs::null_default")]
    pub description: String,
}

impl Record for Tag {
    const KIND: ObjectKind = ObjectKind::Tag;
    type Key = String;

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    fn natural_key(&self) -> String {
        self.name.clone()
    }

    fn base(&self) -> Option<&Base> {
        None
    }

    fn base_mut(&mut self) -> Option<&mut Base> {
        None
    }

    fn references(&self) -> Vec<ObjectRef> {
        Vec::new()
    }
}

/// Returns true if `color` is exactly six lowercase hex digits.
pub fn is_valid_color(color: &str) -> bool {
    color.len() == 6
        && color
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomField {
    #[serde(skip_serializing_if = "refs::is_unset")]
    pub id: i64,
    pub name: String,
    #[serde(deserialize_with = "refs::null_default")]
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: CustomFieldType,
    /// `app_label.model` names of the kinds the field applies to.
    #[serde(rename = "object_types", alias = "content_types")]
    pub content_types: Vec<String>,
    #[serde(deserialize_with = "refs::null_default")]
    pub description: String,
    pub filter_logic: CustomFieldFilterLogic,
    pub ui_visible: CustomFieldUiVisible,
    pub ui_editable: CustomFieldUiEditable,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_weight: Option<u32>,
}

impl CustomField {
    pub fn for_kinds(
        name: &str,
        label: &str,
        field_type: CustomFieldType,
        kinds: impl IntoIterator<Item = ObjectKind>,
        description: &str,
    ) -> CustomField {
        CustomField {
            name: name.to_owned(),
            label: label.to_owned(),
            field_type,
            content_types: kinds
                .into_iter()
                .map(|kind| kind.content_type().to_owned())
                .collect(),
            description: description.to_owned(),
            search_weight: Some(1000),
            ..Default::default()
        }
    }
}

impl Record for CustomField {
    const KIND: ObjectKind = ObjectKind::CustomField;
    type Key = String;

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    fn natural_key(&self) -> String {
        self.name.clone()
    }

    fn base(&self) -> Option<&Base> {
        None
    }

    fn base_mut(&mut self) -> Option<&mut Base> {
        None
    }

    fn references(&self) -> Vec<ObjectRef> {
        Vec::new()
    }
}

impl CustomFieldType {
    /// Converts `value` into the JSON shape the registry accepts for a field
    /// of this type.  Values that cannot be converted are returned unchanged
    /// and left for the registry to reject.
    pub fn coerce(&self, value: Value) -> Value {
        match (self, value) {
            (_, Value::Null) => Value::Null,
            (
                CustomFieldType::Text
                | CustomFieldType::LongText
                | CustomFieldType::Url,
                Value::Number(n),
            ) => Value::String(n.to_string()),
            (
                CustomFieldType::Text
                | CustomFieldType::LongText
                | CustomFieldType::Url,
                Value::Bool(b),
            ) => Value::String(b.to_string()),
            (CustomFieldType::Integer, Value::String(s)) => {
                match s.trim().parse::<i64>() {
                    Ok(n) => Value::from(n),
                    Err(_) => Value::String(s),
                }
            }
            (CustomFieldType::Integer, Value::Number(n)) => {
                match (n.as_i64(), n.as_f64()) {
                    (Some(i), _) => Value::from(i),
                    (None, Some(f)) if f.fract() == 0.0 => {
                        Value::from(f as i64)
                    }
                    _ => Value::Number(n),
                }
            }
            (CustomFieldType::Decimal, Value::String(s)) => {
                match s.trim().parse::<f64>() {
                    Ok(f) => Value::from(f),
                    Err(_) => Value::String(s),
                }
            }
            (CustomFieldType::Boolean, Value::String(s)) => {
                match s.trim().to_ascii_lowercase().as_str() {
                    "true" | "yes" | "1" => Value::Bool(true),
                    "false" | "no" | "0" => Value::Bool(false),
                    _ => Value::String(s),
                }
            }
            (CustomFieldType::Boolean, Value::Number(n)) => match n.as_i64() {
                Some(0) => Value::Bool(false),
                Some(1) => Value::Bool(true),
                _ => Value::Number(n),
            },
            (CustomFieldType::Date, Value::String(s)) => {
                match DateTime::parse_from_rfc3339(&s) {
                    Ok(dt) => Value::String(
                        dt.with_timezone(&Utc).date_naive().to_string(),
                    ),
                    Err(_) => Value::String(s),
                }
            }
            (CustomFieldType::DateTime, Value::String(s)) => {
                if let Ok(date) = NaiveDate::parse_from_str(&s, "%Y-%m-%d") {
                    match date.and_hms_opt(0, 0, 0) {
                        Some(dt) => Value::String(
                            dt.and_utc().to_rfc3339_opts(
                                chrono::SecondsFormat::Secs,
                                true,
                            ),
                        ),
                        None => Value::String(s),
                    }
                } else {
                    Value::String(s)
                }
            }
            (_, value) => value,
        }
    }
}
