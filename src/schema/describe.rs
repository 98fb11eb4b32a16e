//! Schema descriptions: schemas as record values.
//!
//! ```text
//! {"type": "array", "head": [{"type": "long"}], "rest": {"type": "string"}}
//! {"type": "record", "fields": [{"name": "a", "schema": {...}, "optional": true}]}
//! {"type": "long", "min": 0, "max": 10, "annotation": {...}}
//! ```
//!
//! Absent properties are omitted. Parsing is strict: unknown properties and
//! properties of the wrong type are errors.

use std::sync::Arc;

use super::{
    ArraySchema, BinarySchema, NumericSchema, RecordField, RecordSchema, Schema, SchemaKind,
    SchemaPattern, StringSchema,
};
use crate::error::{SchemaError, SchemaResult};
use crate::value::{LogicalType, RecordBuilder, RecordValue, Value};

fn invalid(message: impl Into<String>) -> SchemaError {
    SchemaError::InvalidDescription(message.into())
}

fn type_name(kind: &SchemaKind) -> &'static str {
    match kind {
        SchemaKind::Any => "any",
        SchemaKind::Null => "null",
        SchemaKind::Boolean { .. } => "boolean",
        SchemaKind::Long(_) => "long",
        SchemaKind::Double(_) => "double",
        SchemaKind::Decimal(_) => "decfloat",
        SchemaKind::String(_) => "string",
        SchemaKind::Binary(_) => "binary",
        SchemaKind::Array(_) => "array",
        SchemaKind::Record(_) => "record",
        SchemaKind::Date(_) => "date",
        SchemaKind::SchemaType => "schematype",
        SchemaKind::Function => "function",
        SchemaKind::JavaObject { .. } => "javaobject",
        SchemaKind::Regex => "regex",
        SchemaKind::Span => "span",
        SchemaKind::Or(_) => "or",
    }
}

fn length(v: u64) -> Value {
    Value::Long(i64::try_from(v).unwrap_or(i64::MAX))
}

impl Schema {
    /// The record describing this schema.
    pub fn to_value(&self) -> Value {
        let mut out = RecordBuilder::new();
        out.set("type", Value::from(type_name(&self.kind)));
        let mut put = |name: &str, value: Option<Value>| {
            if let Some(v) = value {
                out.set(name, v);
            }
        };
        match &self.kind {
            SchemaKind::Boolean { value } => put("value", value.map(Value::Boolean)),
            SchemaKind::Long(n)
            | SchemaKind::Double(n)
            | SchemaKind::Decimal(n)
            | SchemaKind::Date(n) => {
                put("min", n.min.clone());
                put("max", n.max.clone());
                put("value", n.value.clone());
            }
            SchemaKind::String(s) => {
                put("minLength", s.min_length.map(length));
                put("maxLength", s.max_length.map(length));
                put("pattern", s.pattern.as_ref().map(|p| Value::string(p.source())));
                put("value", s.value.clone().map(Value::String));
            }
            SchemaKind::Binary(b) => {
                put("minLength", b.min_length.map(length));
                put("maxLength", b.max_length.map(length));
                put("value", b.value.clone().map(Value::Binary));
            }
            SchemaKind::Array(a) => {
                put(
                    "head",
                    Some(Value::array(a.head.iter().map(Schema::to_value).collect())),
                );
                put("rest", a.rest.as_deref().map(Schema::to_value));
            }
            SchemaKind::Record(r) => {
                let fields = r
                    .fields
                    .iter()
                    .map(|f| {
                        let mut field = RecordBuilder::new();
                        field.set("name", Value::String(f.name.clone()));
                        field.set("schema", f.schema.to_value());
                        field.set("optional", Value::Boolean(f.optional));
                        field.build()
                    })
                    .collect();
                put("fields", Some(Value::array(fields)));
                put("additional", r.additional.as_deref().map(Schema::to_value));
            }
            SchemaKind::JavaObject { class } => {
                put("class", class.clone().map(Value::String));
            }
            SchemaKind::Or(members) => {
                put(
                    "members",
                    Some(Value::array(members.iter().map(Schema::to_value).collect())),
                );
            }
            SchemaKind::Any
            | SchemaKind::Null
            | SchemaKind::SchemaType
            | SchemaKind::Function
            | SchemaKind::Regex
            | SchemaKind::Span => {}
        }
        put("annotation", self.annotation.clone());
        out.build()
    }

    /// Parses a description produced by [`Schema::to_value`].
    pub fn from_value(value: &Value) -> SchemaResult<Schema> {
        let record = value
            .as_record()
            .ok_or_else(|| invalid(format!("expected a record, found {}", value.logical_type())))?;
        let mut props = Props::new(record);
        let type_name = props.string("type")?.ok_or_else(|| invalid("missing \"type\""))?;

        let kind = match &*type_name {
            "any" => SchemaKind::Any,
            "null" => SchemaKind::Null,
            "boolean" => SchemaKind::Boolean {
                value: props.take("value", LogicalType::Boolean)?.and_then(|v| v.as_bool()),
            },
            "long" => SchemaKind::Long(props.numeric(LogicalType::Long)?),
            "double" => SchemaKind::Double(props.numeric(LogicalType::Double)?),
            "decfloat" => SchemaKind::Decimal(props.numeric(LogicalType::Decfloat)?),
            "date" => SchemaKind::Date(props.numeric(LogicalType::Date)?),
            "string" => {
                let (min_length, max_length) = props.lengths()?;
                let pattern = props
                    .string("pattern")?
                    .map(|p| SchemaPattern::new(&p))
                    .transpose()?;
                let value = props.string("value")?;
                SchemaKind::String(StringSchema {
                    min_length,
                    max_length,
                    pattern,
                    value,
                })
            }
            "binary" => {
                let (min_length, max_length) = props.lengths()?;
                let value = props.take("value", LogicalType::Binary)?.and_then(|v| match v {
                    Value::Binary(b) => Some(b),
                    _ => None,
                });
                SchemaKind::Binary(BinarySchema {
                    min_length,
                    max_length,
                    value,
                })
            }
            "array" => {
                let head = props.schemas("head")?.unwrap_or_default();
                let rest = props.schema("rest")?.map(Box::new);
                SchemaKind::Array(ArraySchema { head, rest })
            }
            "record" => {
                let fields = props
                    .take("fields", LogicalType::Array)?
                    .map(|v| parse_fields(&v))
                    .transpose()?
                    .unwrap_or_default();
                let additional = props.schema("additional")?;
                let record = Schema::record(fields, additional)?;
                record.kind
            }
            "schematype" => SchemaKind::SchemaType,
            "function" => SchemaKind::Function,
            "javaobject" => SchemaKind::JavaObject {
                class: props.string("class")?,
            },
            "regex" => SchemaKind::Regex,
            "span" => SchemaKind::Span,
            "or" => {
                let members = props.schemas("members")?.unwrap_or_default();
                Schema::or(members).kind
            }
            other => return Err(invalid(format!("unknown schema type {other:?}"))),
        };
        let annotation = props.take("annotation", LogicalType::Record)?;
        props.finish()?;
        Ok(Schema { kind, annotation })
    }
}

fn parse_fields(value: &Value) -> SchemaResult<Vec<RecordField>> {
    let items = value
        .as_array()
        .ok_or_else(|| invalid("\"fields\" must be an array"))?;
    items
        .iter()
        .map(|item| {
            let record = item
                .as_record()
                .ok_or_else(|| invalid("record field descriptions must be records"))?;
            let mut props = Props::new(record);
            let name = props.string("name")?.ok_or_else(|| invalid("field without \"name\""))?;
            let schema = props
                .schema("schema")?
                .ok_or_else(|| invalid(format!("field {name:?} without \"schema\"")))?;
            let optional = props
                .take("optional", LogicalType::Boolean)?
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
            props.finish()?;
            Ok(RecordField {
                name,
                schema,
                optional,
            })
        })
        .collect()
}

/// Property reader that remembers which properties were consumed.
struct Props<'a> {
    record: &'a RecordValue,
    used: Vec<&'static str>,
}

impl<'a> Props<'a> {
    fn new(record: &'a RecordValue) -> Self {
        Props {
            record,
            used: Vec::new(),
        }
    }

    fn take(&mut self, name: &'static str, expected: LogicalType) -> SchemaResult<Option<Value>> {
        self.used.push(name);
        match self.record.get(name) {
            None => Ok(None),
            Some(v) if v.logical_type() == expected => Ok(Some(v.clone())),
            Some(v) => Err(invalid(format!(
                "\"{name}\" must be {expected}, found {}",
                v.logical_type()
            ))),
        }
    }

    fn string(&mut self, name: &'static str) -> SchemaResult<Option<Arc<str>>> {
        Ok(self.take(name, LogicalType::String)?.and_then(|v| match v {
            Value::String(s) => Some(s),
            _ => None,
        }))
    }

    fn length(&mut self, name: &'static str) -> SchemaResult<Option<u64>> {
        match self.take(name, LogicalType::Long)?.and_then(|v| v.as_long()) {
            None => Ok(None),
            Some(n) => u64::try_from(n)
                .map(Some)
                .map_err(|_| invalid(format!("\"{name}\" must not be negative"))),
        }
    }

    fn lengths(&mut self) -> SchemaResult<(Option<u64>, Option<u64>)> {
        let min = self.length("minLength")?;
        let max = self.length("maxLength")?;
        if let (Some(lo), Some(hi)) = (min, max) {
            if lo > hi {
                return Err(SchemaError::InvalidBounds(format!(
                    "minLength {lo} exceeds maxLength {hi}"
                )));
            }
        }
        Ok((min, max))
    }

    fn numeric(&mut self, t: LogicalType) -> SchemaResult<NumericSchema> {
        let min = self.take("min", t)?;
        let max = self.take("max", t)?;
        let value = self.take("value", t)?;
        if let (Some(lo), Some(hi)) = (&min, &max) {
            if lo > hi {
                return Err(SchemaError::InvalidBounds(format!("{t}: min {lo} exceeds max {hi}")));
            }
        }
        Ok(NumericSchema { min, max, value })
    }

    fn schema(&mut self, name: &'static str) -> SchemaResult<Option<Schema>> {
        self.take(name, LogicalType::Record)?
            .map(|v| Schema::from_value(&v))
            .transpose()
    }

    fn schemas(&mut self, name: &'static str) -> SchemaResult<Option<Vec<Schema>>> {
        let Some(list) = self.take(name, LogicalType::Array)? else {
            return Ok(None);
        };
        list.as_array()
            .map(|items| items.iter().map(|v| Schema::from_value(&v)).collect())
            .transpose()
    }

    /// Rejects properties nobody asked for.
    fn finish(self) -> SchemaResult<()> {
        match self
            .record
            .names()
            .find(|n| !self.used.iter().any(|u| u == n))
        {
            Some(unknown) => Err(invalid(format!("unknown property {unknown:?}"))),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(schema: &Schema) -> Schema {
        Schema::from_value(&schema.to_value()).unwrap()
    }

    #[test]
    fn test_description_shape() {
        let s = Schema::array(vec![Schema::long()], Some(Schema::string()));
        let described = s.to_value();
        let rec = described.as_record().unwrap();
        assert_eq!(rec.get("type"), Some(&Value::from("array")));
        assert_eq!(rec.names().collect::<Vec<_>>(), vec!["head", "rest", "type"]);
    }

    #[test]
    fn test_round_trip_every_kind() {
        let annotation = RecordValue::from_pairs([("doc", Value::from("ids"))]).unwrap();
        let schemas = vec![
            Schema::any(),
            Schema::null(),
            Schema::constant(&Value::Boolean(false)).unwrap(),
            Schema::long_range(Some(-1), Some(7)).unwrap(),
            Schema::double_range(None, Some(2.5)).unwrap(),
            Schema::decimal(),
            Schema::date_range(Some(0), None).unwrap(),
            Schema::string_with(Some(1), Some(3), Some("[a-c]+")).unwrap(),
            Schema::constant(&Value::from("k")).unwrap(),
            Schema::binary_with(None, Some(16)).unwrap(),
            Schema::array(vec![Schema::long(), Schema::null()], Some(Schema::any())),
            Schema::record(
                vec![
                    RecordField::required("a", Schema::long()),
                    RecordField::optional("b", Schema::string()),
                ],
                Some(Schema::boolean()),
            )
            .unwrap(),
            Schema::schematype(),
            Schema::function(),
            Schema::java_object(Some("java.util.Date")),
            Schema::regex(),
            Schema::span(),
            Schema::or([Schema::long(), Schema::string()]),
            Schema::long().with_annotation(annotation),
        ];
        for schema in schemas {
            assert_eq!(round_trip(&schema), schema, "{schema}");
        }
    }

    #[test]
    fn test_unknown_property_rejected() {
        let mut desc = RecordBuilder::new();
        desc.set("type", Value::from("long"));
        desc.set("minimum", Value::Long(0));
        let err = Schema::from_value(&desc.build()).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidDescription(_)));
    }

    #[test]
    fn test_wrongly_typed_property_rejected() {
        let mut desc = RecordBuilder::new();
        desc.set("type", Value::from("long"));
        desc.set("min", Value::from("zero"));
        assert!(Schema::from_value(&desc.build()).is_err());
        assert!(Schema::from_value(&Value::Long(1)).is_err());
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let mut desc = RecordBuilder::new();
        desc.set("type", Value::from("long"));
        desc.set("min", Value::Long(5));
        desc.set("max", Value::Long(1));
        assert!(matches!(
            Schema::from_value(&desc.build()),
            Err(SchemaError::InvalidBounds(_))
        ));
    }
}
