//! ---
//! rfn_section: "03-function-pipeline"
//! rfn_subsection: "module"
//! rfn_type: "source"
//! rfn_scope: "code"
//! rfn_description: "Handler contract, option resolution, and batch dispatch."
//! rfn_version: "v0.0.0-prealpha"
//! rfn_owner: "tbd"
//! ---
//! Schema binding for structured payload mode.
//!
//! A schema is any `Deserialize + Default` type whose serde shape is a
//! record (a struct with named fields, or a unit struct). The shape is probed
//! once at configuration time by asking `T::deserialize` which entry point it
//! wants from a deserializer that answers nothing.

use std::any::type_name;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use r_fn_common::BindFailurePolicy;
use r_fn_msg::{Headers, Inputs, MessageError, PayloadValue};
use serde::de::{self, DeserializeOwned, Deserializer, Visitor};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::handler::{HandlerOutput, SchemaHandler};

/// Types usable as a structured payload schema.
pub trait Schema: DeserializeOwned + Default + Send + 'static {}

impl<T> Schema for T where T: DeserializeOwned + Default + Send + 'static {}

/// Serde shape requested by a type's `Deserialize` implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    /// Struct with named fields, or unit struct.
    Record,
    /// Key/value map.
    Map,
    /// Sequence or tuple.
    Sequence,
    /// Scalar, string, bytes, option, or unit.
    Primitive,
    /// Enumeration.
    Enum,
    /// Self-describing or custom deserialization.
    Opaque,
}

impl fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ShapeKind::Record => "record",
            ShapeKind::Map => "map",
            ShapeKind::Sequence => "sequence",
            ShapeKind::Primitive => "primitive",
            ShapeKind::Enum => "enum",
            ShapeKind::Opaque => "opaque value",
        };
        f.write_str(label)
    }
}

/// Descriptor of a schema type, resolved at configuration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaShape {
    /// Rust type name of the schema.
    pub type_name: &'static str,
    /// Shape the type deserializes from.
    pub kind: ShapeKind,
    /// Field names when the shape is a record.
    pub fields: &'static [&'static str],
}

impl SchemaShape {
    /// Probe the serde shape of `T`.
    pub fn of<T: Schema>() -> Self {
        let (kind, fields) = match <T as Deserialize>::deserialize(ShapeProbe) {
            Err(ProbeSignal::Shape(kind, fields)) => (kind, fields),
            Err(ProbeSignal::Custom(_)) | Ok(_) => (ShapeKind::Opaque, &[][..]),
        };
        Self {
            type_name: type_name::<T>(),
            kind,
            fields,
        }
    }

    /// True when the schema can be bound from a JSON object.
    pub fn is_record(&self) -> bool {
        self.kind == ShapeKind::Record
    }
}

#[derive(Debug)]
enum ProbeSignal {
    Shape(ShapeKind, &'static [&'static str]),
    Custom(String),
}

impl fmt::Display for ProbeSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeSignal::Shape(kind, _) => write!(f, "probed {}", kind),
            ProbeSignal::Custom(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for ProbeSignal {}

impl de::Error for ProbeSignal {
    fn custom<M: fmt::Display>(msg: M) -> Self {
        ProbeSignal::Custom(msg.to_string())
    }
}

struct ShapeProbe;

macro_rules! probe_as {
    ($kind:expr => $($method:ident),* $(,)?) => {
        $(
            fn $method<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, Self::Error> {
                Err(ProbeSignal::Shape($kind, &[]))
            }
        )*
    };
}

impl<'de> Deserializer<'de> for ShapeProbe {
    type Error = ProbeSignal;

    probe_as!(ShapeKind::Opaque => deserialize_any, deserialize_ignored_any);
    probe_as!(ShapeKind::Primitive =>
        deserialize_bool, deserialize_i8, deserialize_i16, deserialize_i32, deserialize_i64,
        deserialize_u8, deserialize_u16, deserialize_u32, deserialize_u64,
        deserialize_f32, deserialize_f64, deserialize_char, deserialize_str, deserialize_string,
        deserialize_bytes, deserialize_byte_buf, deserialize_option, deserialize_unit,
        deserialize_identifier,
    );
    probe_as!(ShapeKind::Sequence => deserialize_seq);
    probe_as!(ShapeKind::Map => deserialize_map);

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _visitor: V,
    ) -> Result<V::Value, Self::Error> {
        Err(ProbeSignal::Shape(ShapeKind::Record, &[]))
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_tuple<V: Visitor<'de>>(
        self,
        _len: usize,
        _visitor: V,
    ) -> Result<V::Value, Self::Error> {
        Err(ProbeSignal::Shape(ShapeKind::Sequence, &[]))
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        _visitor: V,
    ) -> Result<V::Value, Self::Error> {
        Err(ProbeSignal::Shape(ShapeKind::Sequence, &[]))
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        _visitor: V,
    ) -> Result<V::Value, Self::Error> {
        Err(ProbeSignal::Shape(ShapeKind::Record, fields))
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        _visitor: V,
    ) -> Result<V::Value, Self::Error> {
        Err(ProbeSignal::Shape(ShapeKind::Enum, &[]))
    }
}

/// Materialize raw payload bytes into a fresh instance of the schema.
pub fn bind<T: Schema>(bytes: &[u8]) -> Result<T, MessageError> {
    serde_json::from_slice(bytes).map_err(|source| MessageError::Bind {
        schema: type_name::<T>(),
        source,
    })
}

trait StructuredInvoker: Send + Sync {
    fn invoke(
        &self,
        bytes: &[u8],
        headers: &Headers,
        inputs: &Inputs,
        on_bind_failure: BindFailurePolicy,
    ) -> Result<HandlerOutput<PayloadValue>, MessageError>;
}

struct TypedInvoker<T, O, H> {
    handler: H,
    _marker: PhantomData<fn(T) -> O>,
}

impl<T, O, H> StructuredInvoker for TypedInvoker<T, O, H>
where
    T: Schema,
    O: Serialize + 'static,
    H: SchemaHandler<T, O>,
{
    fn invoke(
        &self,
        bytes: &[u8],
        headers: &Headers,
        inputs: &Inputs,
        on_bind_failure: BindFailurePolicy,
    ) -> Result<HandlerOutput<PayloadValue>, MessageError> {
        let record = match bind::<T>(bytes) {
            Ok(record) => record,
            Err(err) => match on_bind_failure {
                BindFailurePolicy::Reject => return Err(err),
                BindFailurePolicy::Lenient => {
                    warn!(
                        schema = type_name::<T>(),
                        error = %err,
                        "schema binding failed; handing default record to handler"
                    );
                    T::default()
                }
            },
        };

        let output = self
            .handler
            .handle(record, headers, inputs)
            .map_err(MessageError::Handler)?;
        output.try_map_payload(PayloadValue::from_output)
    }
}

/// The structured payload modifier: a schema descriptor plus the typed
/// handler that consumes it.
#[derive(Clone)]
pub struct SchemaBinding {
    shape: SchemaShape,
    invoker: Arc<dyn StructuredInvoker>,
}

impl SchemaBinding {
    /// Bind `handler` to the schema type `T`. An output of type `Vec<u8>` is
    /// forwarded as raw bytes, any other `O` as JSON.
    pub fn new<T, O, H>(handler: H) -> Self
    where
        T: Schema,
        O: Serialize + 'static,
        H: SchemaHandler<T, O> + 'static,
    {
        Self {
            shape: SchemaShape::of::<T>(),
            invoker: Arc::new(TypedInvoker {
                handler,
                _marker: PhantomData,
            }),
        }
    }

    /// Descriptor of the bound schema.
    pub fn shape(&self) -> &SchemaShape {
        &self.shape
    }

    /// Bind `bytes`, run the handler, and capture its output as a structured value.
    pub fn invoke(
        &self,
        bytes: &[u8],
        headers: &Headers,
        inputs: &Inputs,
        on_bind_failure: BindFailurePolicy,
    ) -> Result<HandlerOutput<PayloadValue>, MessageError> {
        self.invoker.invoke(bytes, headers, inputs, on_bind_failure)
    }
}

impl fmt::Debug for SchemaBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaBinding")
            .field("shape", &self.shape)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde_json::json;

    use super::*;

    #[derive(Debug, Default, Deserialize, Serialize, PartialEq)]
    struct Order {
        sku: String,
        qty: u32,
    }

    #[derive(Debug, Default, Deserialize)]
    struct Marker;

    #[derive(Debug, Default, Deserialize)]
    struct OrderId(Order);

    #[derive(Debug, Default, Deserialize)]
    enum Status {
        #[default]
        Open,
    }

    #[test]
    fn structs_probe_as_records_with_fields() {
        let shape = SchemaShape::of::<Order>();
        assert!(shape.is_record());
        assert_eq!(shape.fields, &["sku", "qty"]);
        assert!(shape.type_name.ends_with("Order"));
        assert!(SchemaShape::of::<Marker>().is_record());
        assert!(SchemaShape::of::<OrderId>().is_record());
    }

    #[test]
    fn non_records_are_classified() {
        assert_eq!(SchemaShape::of::<u64>().kind, ShapeKind::Primitive);
        assert_eq!(SchemaShape::of::<String>().kind, ShapeKind::Primitive);
        assert_eq!(SchemaShape::of::<Option<Order>>().kind, ShapeKind::Primitive);
        assert_eq!(SchemaShape::of::<Vec<Order>>().kind, ShapeKind::Sequence);
        assert_eq!(SchemaShape::of::<(u8, u8)>().kind, ShapeKind::Sequence);
        assert_eq!(
            SchemaShape::of::<HashMap<String, String>>().kind,
            ShapeKind::Map
        );
        assert_eq!(SchemaShape::of::<Status>().kind, ShapeKind::Enum);
        assert_eq!(SchemaShape::of::<serde_json::Value>().kind, ShapeKind::Opaque);
    }

    #[test]
    fn bind_materializes_fresh_records() {
        let order: Order = bind(br#"{"sku":"A-1","qty":3}"#).expect("bind order");
        assert_eq!(
            order,
            Order {
                sku: "A-1".into(),
                qty: 3
            }
        );
        let err = bind::<Order>(b"not json").expect_err("malformed payload");
        assert_eq!(err.kind(), "bind");
    }

    fn doubling_binding() -> SchemaBinding {
        SchemaBinding::new(
            |order: Order, headers: &Headers, _inputs: &Inputs| -> anyhow::Result<HandlerOutput<Order>> {
                Ok(HandlerOutput::transformed(
                    Order {
                        qty: order.qty * 2,
                        ..order
                    },
                    headers.clone(),
                ))
            },
        )
    }

    #[test]
    fn invoke_binds_runs_and_captures_structured_output() {
        let output = doubling_binding()
            .invoke(
                br#"{"sku":"A-1","qty":3}"#,
                &Headers::new(),
                &Inputs::new(),
                BindFailurePolicy::Reject,
            )
            .expect("invoke");
        assert_eq!(
            output.payload,
            Some(PayloadValue::Structured(json!({"sku": "A-1", "qty": 6})))
        );
    }

    #[test]
    fn byte_outputs_skip_json_rendering() {
        let binding = SchemaBinding::new(
            |order: Order, headers: &Headers, _inputs: &Inputs| -> anyhow::Result<HandlerOutput<Vec<u8>>> {
                Ok(HandlerOutput::transformed(order.sku.into_bytes(), headers.clone()))
            },
        );
        let output = binding
            .invoke(
                br#"{"sku":"A-1","qty":3}"#,
                &Headers::new(),
                &Inputs::new(),
                BindFailurePolicy::Reject,
            )
            .expect("invoke");
        assert_eq!(output.payload, Some(PayloadValue::Bytes(b"A-1".to_vec())));
    }

    #[test]
    fn bind_failure_policy_controls_fate() {
        let binding = doubling_binding();
        let err = binding
            .invoke(b"{", &Headers::new(), &Inputs::new(), BindFailurePolicy::Reject)
            .expect_err("rejected");
        assert_eq!(err.kind(), "bind");

        let output = binding
            .invoke(b"{", &Headers::new(), &Inputs::new(), BindFailurePolicy::Lenient)
            .expect("lenient");
        assert_eq!(
            output.payload,
            Some(PayloadValue::Structured(json!({"sku": "", "qty": 0})))
        );
    }
}
