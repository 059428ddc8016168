//! Meaning for well-known library classes found in a parsed [`Graph`].
//!
//! Boxed primitives, collections, maps, dates and `java.time` values are
//! recognised by walking an object's class chain from the most derived class
//! up, so subclasses (`LinkedHashMap`, `Properties`, `java.sql.Timestamp`)
//! inherit their parent's reading. Anything else becomes a plain object of
//! its serialized fields.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use num_bigint::{BigInt, Sign};

use crate::context::error::{DecodeError, RenderError};
use crate::context::java_time::{self, JavaTime};
use crate::context::stream::{ClassData, Graph, Object, ObjectId, Value, SC_EXTERNALIZABLE};

/// Deepest nesting a single entry's value may have when rendered.
pub const MAX_RENDER_DEPTH: usize = 64;

/// Work allowed for one entry: one unit per value visited plus one per
/// string byte or primitive array element. Shared objects are expanded at
/// every reference, so this bounds the output as well as the time.
pub const MAX_RENDER_UNITS: usize = 1 << 21;

/// Largest `BigInteger` magnitude rendered as decimal text.
pub const MAX_MAGNITUDE_BYTES: usize = 8 * 1024;

const COLL_SER: &str = "java.util.CollSer";
const BIG_INTEGER: &str = "java.math.BigInteger";
const BIG_DECIMAL: &str = "java.math.BigDecimal";

#[derive(Debug, Clone, PartialEq)]
pub enum ContextValue {
    Null,
    Bool(bool),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Char(u16),
    /// `java.math.BigInteger`.
    Integer(BigInt),
    /// `java.math.BigDecimal`: `unscaled × 10^-scale`.
    Decimal { unscaled: BigInt, scale: i32 },
    Str(String),
    Enum(String),
    Time(JavaTime),
    /// `java.util.Date` and subclasses, as epoch milliseconds.
    EpochMillis(i64),
    /// Values that have a canonical string form: UUIDs, URIs, class
    /// literals, `char[]`, base64 of `byte[]`.
    Text(String),
    List(Vec<ContextValue>),
    Map(Vec<(ContextValue, ContextValue)>),
    Object(Vec<(String, ContextValue)>),
}

/// Reading of one instance, before its children are interpreted.
enum Shape {
    Boxed(Value),
    Map(Vec<(Value, Value)>),
    Collection(Vec<Value>),
    Wrapper(Value),
    /// Backing array of which only the first `n` slots are elements.
    Prefix(Value, usize),
    Date(i64),
    BigInteger { signum: i32, magnitude: Value },
    BigDecimal { unscaled: Value, scale: i32 },
    Time(JavaTime),
    Text(String),
    Fields(Vec<(String, Value)>),
}

fn missing(class: &str) -> RenderError {
    RenderError::Truncated(class.to_string())
}

fn field(level: &ClassData, class: &str, name: &str) -> Result<Value, RenderError> {
    level.field(name).cloned().ok_or_else(|| missing(class))
}

/// Annotation objects of every level, superclass first.
fn annotation_values(data: &[ClassData]) -> Vec<Value> {
    data.iter().flat_map(|level| level.values().cloned()).collect()
}

/// Consecutive key/value pairs. Null keys are dropped, which also removes
/// the terminator some concurrent maps write.
fn pairs(values: Vec<Value>) -> Vec<(Value, Value)> {
    let mut out = Vec::with_capacity(values.len() / 2);
    let mut it = values.into_iter();
    while let (Some(k), Some(v)) = (it.next(), it.next()) {
        if k != Value::Null {
            out.push((k, v));
        }
    }
    out
}

fn uuid_text(most: i64, least: i64) -> String {
    let (most, least) = (most as u64, least as u64);
    format!(
        "{:08x}-{:04x}-{:04x}-{:04x}-{:012x}",
        most >> 32,
        (most >> 16) & 0xFFFF,
        most & 0xFFFF,
        least >> 48,
        least & 0xFFFF_FFFF_FFFF
    )
}

fn known(name: &str, level: &ClassData, data: &[ClassData]) -> Result<Option<Shape>, RenderError> {
    let shape = match name {
        "java.lang.Boolean" | "java.lang.Byte" | "java.lang.Character" | "java.lang.Short"
        | "java.lang.Integer" | "java.lang.Long" | "java.lang.Float" | "java.lang.Double" => {
            Shape::Boxed(field(level, name, "value")?)
        }

        "java.util.HashMap"
        | "java.util.Hashtable"
        | "java.util.TreeMap"
        | "java.util.IdentityHashMap"
        | "java.util.EnumMap"
        | "java.util.concurrent.ConcurrentHashMap"
        | "java.util.concurrent.ConcurrentSkipListMap" => Shape::Map(pairs(annotation_values(data))),

        "java.util.ArrayList"
        | "java.util.LinkedList"
        | "java.util.HashSet"
        | "java.util.ArrayDeque"
        | "java.util.PriorityQueue"
        | "java.util.concurrent.CopyOnWriteArrayList" => {
            Shape::Collection(annotation_values(data))
        }

        // comparator first, then the elements
        "java.util.TreeSet" => Shape::Collection(annotation_values(data).into_iter().skip(1).collect()),

        "java.util.Vector" => {
            let count = match field(level, name, "elementCount")? {
                Value::Int(n) => n.max(0) as usize,
                _ => return Err(missing(name)),
            };
            Shape::Prefix(field(level, name, "elementData")?, count)
        }

        "java.util.Arrays$ArrayList" => Shape::Wrapper(field(level, name, "a")?),
        "java.util.concurrent.CopyOnWriteArraySet" => Shape::Wrapper(field(level, name, "al")?),
        "java.util.EnumSet$SerializationProxy" => Shape::Wrapper(field(level, name, "elements")?),
        "java.util.Collections$UnmodifiableCollection"
        | "java.util.Collections$SynchronizedCollection"
        | "java.util.Collections$CheckedCollection" => Shape::Wrapper(field(level, name, "c")?),
        "java.util.Collections$UnmodifiableMap"
        | "java.util.Collections$SynchronizedMap"
        | "java.util.Collections$CheckedMap" => Shape::Wrapper(field(level, name, "m")?),

        "java.util.Collections$EmptyList" | "java.util.Collections$EmptySet" => {
            Shape::Collection(Vec::new())
        }
        "java.util.Collections$EmptyMap" => Shape::Map(Vec::new()),
        "java.util.Collections$SingletonList" | "java.util.Collections$SingletonSet" => {
            Shape::Collection(vec![field(level, name, "element")?])
        }
        "java.util.Collections$SingletonMap" => {
            Shape::Map(vec![(field(level, name, "k")?, field(level, name, "v")?)])
        }

        COLL_SER => match coll_ser_tag(level) {
            Some(1 | 2 | 4) => Shape::Collection(level.values().cloned().collect()),
            Some(3) => Shape::Map(pairs(level.values().cloned().collect())),
            _ => return Err(RenderError::Opaque(name.to_string())),
        },

        "java.util.Date" => {
            let block = level.block_data();
            let millis = block
                .get(..8)
                .and_then(|b| <[u8; 8]>::try_from(b).ok())
                .map(i64::from_be_bytes)
                .ok_or_else(|| missing(name))?;
            Shape::Date(millis)
        }

        BIG_INTEGER => match (field(level, name, "signum")?, field(level, name, "magnitude")?) {
            (Value::Int(signum), magnitude) => Shape::BigInteger { signum, magnitude },
            _ => return Err(missing(name)),
        },

        BIG_DECIMAL => match (field(level, name, "intVal")?, field(level, name, "scale")?) {
            (unscaled, Value::Int(scale)) => Shape::BigDecimal { unscaled, scale },
            _ => return Err(missing(name)),
        },

        java_time::SER_CLASS => Shape::Time(java_time::decode(&level.block_data())?),

        "java.util.UUID" => match (
            field(level, name, "mostSigBits")?,
            field(level, name, "leastSigBits")?,
        ) {
            (Value::Long(most), Value::Long(least)) => Shape::Text(uuid_text(most, least)),
            _ => return Err(missing(name)),
        },

        "java.net.URI" => match field(level, name, "string")? {
            Value::Str(s) => Shape::Text(s),
            _ => return Err(missing(name)),
        },

        _ => return Ok(None),
    };
    Ok(Some(shape))
}

fn coll_ser_tag(level: &ClassData) -> Option<i32> {
    match level.field("tag") {
        Some(Value::Int(tag)) => Some(tag & 0xFF),
        _ => None,
    }
}

fn classify(graph: &Graph, data: &[ClassData]) -> Result<Shape, RenderError> {
    for level in data.iter().rev() {
        let name = graph.class(level.class).name.as_str();
        if let Some(shape) = known(name, level, data)? {
            return Ok(shape);
        }
    }

    if let Some(level) = data
        .iter()
        .find(|level| graph.class(level.class).has_flag(SC_EXTERNALIZABLE))
    {
        return Err(RenderError::Opaque(graph.class(level.class).name.clone()));
    }

    // superclass fields first; a shadowing subclass field replaces the value
    let mut fields: Vec<(String, Value)> = Vec::new();
    for level in data {
        for (name, value) in &level.fields {
            match fields.iter_mut().find(|(n, _)| n == name) {
                Some(slot) => slot.1 = value.clone(),
                None => fields.push((name.clone(), value.clone())),
            }
        }
    }
    Ok(Shape::Fields(fields))
}

/// Entries of the top-level map, following unmodifiable/synchronized
/// wrappers down to the backing map.
pub fn root_entries(graph: &Graph) -> Result<Vec<(Value, Value)>, DecodeError> {
    let mut current = graph.root.clone();
    for _ in 0..MAX_RENDER_DEPTH {
        let Value::Object(id) = current else {
            return Err(DecodeError::NotAMap(type_name(graph, &current)));
        };
        let Object::Instance { class, data } = graph.object(id) else {
            return Err(DecodeError::NotAMap(type_name(graph, &current)));
        };
        match classify(graph, data)? {
            Shape::Map(entries) => return Ok(entries),
            Shape::Wrapper(inner) => current = inner,
            _ => return Err(DecodeError::NotAMap(graph.class(*class).name.clone())),
        }
    }
    Err(DecodeError::TooDeep(MAX_RENDER_DEPTH))
}

/// Runtime class name of a value, with serialization proxies resolved to
/// the type they stand for.
pub fn type_name(graph: &Graph, value: &Value) -> String {
    let name = match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Byte(_) => "byte",
        Value::Char(_) => "char",
        Value::Short(_) => "short",
        Value::Int(_) => "int",
        Value::Long(_) => "long",
        Value::Float(_) => "float",
        Value::Double(_) => "double",
        Value::Str(_) => "java.lang.String",
        Value::Object(id) => match graph.object(*id) {
            Object::Instance { class, data } => return instance_type_name(graph, *class, data),
            Object::Array { class, .. } | Object::Enum { class, .. } => {
                return graph.class(*class).name.clone()
            }
            Object::Class(_) => "java.lang.Class",
            Object::Pending => "java.lang.Object",
        },
    };
    name.to_string()
}

fn instance_type_name(graph: &Graph, class: usize, data: &[ClassData]) -> String {
    let name = &graph.class(class).name;
    let Some(level) = data.last() else {
        return name.clone();
    };
    match name.as_str() {
        java_time::SER_CLASS => java_time::type_name(&level.block_data())
            .map(str::to_string)
            .unwrap_or_else(|| name.clone()),
        COLL_SER => {
            let len = level.values().count();
            let resolved = match coll_ser_tag(level) {
                Some(1) if (1..=2).contains(&len) => "List12",
                Some(1 | 4) => "ListN",
                Some(2) if (1..=2).contains(&len) => "Set12",
                Some(2) => "SetN",
                Some(3) if len == 2 => "Map1",
                Some(3) => "MapN",
                _ => return name.clone(),
            };
            format!("java.util.ImmutableCollections${resolved}")
        }
        _ => name.clone(),
    }
}

/// Interprets one value and everything reachable from it.
pub fn interpret(graph: &Graph, value: &Value) -> Result<ContextValue, RenderError> {
    Interpreter {
        graph,
        path: Vec::new(),
        budget: MAX_RENDER_UNITS,
    }
    .value(value)
}

struct Interpreter<'g> {
    graph: &'g Graph,
    /// Objects currently being interpreted, root first.
    path: Vec<ObjectId>,
    /// Units left before the entry is given up on.
    budget: usize,
}

impl<'g> Interpreter<'g> {
    fn charge(&mut self, units: usize) -> Result<(), RenderError> {
        self.budget = self
            .budget
            .checked_sub(units)
            .ok_or(RenderError::TooLarge(MAX_RENDER_UNITS))?;
        Ok(())
    }

    fn value(&mut self, value: &Value) -> Result<ContextValue, RenderError> {
        self.charge(match value {
            Value::Str(s) => 1 + s.len(),
            _ => 1,
        })?;
        Ok(match value {
            Value::Null => ContextValue::Null,
            Value::Bool(b) => ContextValue::Bool(*b),
            Value::Byte(b) => ContextValue::Byte(*b),
            Value::Char(c) => ContextValue::Char(*c),
            Value::Short(s) => ContextValue::Short(*s),
            Value::Int(i) => ContextValue::Int(*i),
            Value::Long(l) => ContextValue::Long(*l),
            Value::Float(f) => ContextValue::Float(*f),
            Value::Double(d) => ContextValue::Double(*d),
            Value::Str(s) => ContextValue::Str(s.clone()),
            Value::Object(id) => self.object(*id)?,
        })
    }

    fn values(&mut self, values: &[Value]) -> Result<Vec<ContextValue>, RenderError> {
        values.iter().map(|v| self.value(v)).collect()
    }

    fn object(&mut self, id: ObjectId) -> Result<ContextValue, RenderError> {
        self.object_prefix(id, usize::MAX)
    }

    /// `limit` caps the elements taken from an array object.
    fn object_prefix(&mut self, id: ObjectId, limit: usize) -> Result<ContextValue, RenderError> {
        if self.path.contains(&id) {
            return Err(RenderError::Cycle);
        }
        if self.path.len() >= MAX_RENDER_DEPTH {
            return Err(RenderError::TooDeep(MAX_RENDER_DEPTH));
        }
        self.path.push(id);
        let out = self.object_inner(id, limit);
        self.path.pop();
        out
    }

    fn object_inner(&mut self, id: ObjectId, limit: usize) -> Result<ContextValue, RenderError> {
        let graph = self.graph;
        match graph.object(id) {
            Object::Pending => Err(RenderError::Cycle),
            Object::Enum { constant, .. } => Ok(ContextValue::Enum(constant.clone())),
            Object::Class(class) => Ok(ContextValue::Text(
                class.map(|c| graph.class(c).name.clone()).unwrap_or_default(),
            )),
            Object::Array { class, elements } => {
                self.array(&graph.class(*class).name, elements, limit)
            }
            Object::Instance { data, .. } => match classify(graph, data)? {
                Shape::Boxed(v) | Shape::Wrapper(v) => self.value(&v),
                Shape::Collection(values) => Ok(ContextValue::List(self.values(&values)?)),
                Shape::Prefix(Value::Object(backing), count) => self.object_prefix(backing, count),
                Shape::Prefix(Value::Null, _) => Ok(ContextValue::List(Vec::new())),
                Shape::Prefix(other, _) => self.value(&other),
                Shape::Map(entries) => {
                    let mut out = Vec::with_capacity(entries.len());
                    for (k, v) in &entries {
                        out.push((self.value(k)?, self.value(v)?));
                    }
                    Ok(ContextValue::Map(out))
                }
                Shape::Date(millis) => Ok(ContextValue::EpochMillis(millis)),
                Shape::BigInteger { signum, magnitude } => {
                    Ok(ContextValue::Integer(self.big_integer(signum, &magnitude)?))
                }
                Shape::BigDecimal { unscaled, scale } => Ok(ContextValue::Decimal {
                    unscaled: self.unscaled(&unscaled)?,
                    scale,
                }),
                Shape::Time(t) => Ok(ContextValue::Time(t)),
                Shape::Text(s) => Ok(ContextValue::Text(s)),
                Shape::Fields(fields) => {
                    let mut out = Vec::with_capacity(fields.len());
                    for (name, v) in fields {
                        let v = self.value(&v)?;
                        out.push((name, v));
                    }
                    Ok(ContextValue::Object(out))
                }
            },
        }
    }

    fn array(
        &mut self,
        class_name: &str,
        elements: &[Value],
        limit: usize,
    ) -> Result<ContextValue, RenderError> {
        let elements = &elements[..limit.min(elements.len())];
        if matches!(class_name, "[C" | "[B") {
            self.charge(elements.len())?;
        }
        match class_name {
            "[C" => {
                let units: Vec<u16> = elements
                    .iter()
                    .filter_map(|v| match v {
                        Value::Char(c) => Some(*c),
                        _ => None,
                    })
                    .collect();
                Ok(ContextValue::Text(String::from_utf16_lossy(&units)))
            }
            "[B" => {
                let bytes: Vec<u8> = elements
                    .iter()
                    .filter_map(|v| match v {
                        Value::Byte(b) => Some(*b as u8),
                        _ => None,
                    })
                    .collect();
                Ok(ContextValue::Text(STANDARD.encode(bytes)))
            }
            _ => Ok(ContextValue::List(self.values(elements)?)),
        }
    }

    /// The `intVal` of a `BigDecimal`, which is always a `BigInteger`.
    fn unscaled(&mut self, value: &Value) -> Result<BigInt, RenderError> {
        let graph = self.graph;
        let Value::Object(id) = value else {
            return Err(missing(BIG_DECIMAL));
        };
        let Object::Instance { data, .. } = graph.object(*id) else {
            return Err(missing(BIG_DECIMAL));
        };
        match classify(graph, data)? {
            Shape::BigInteger { signum, magnitude } => self.big_integer(signum, &magnitude),
            _ => Err(missing(BIG_DECIMAL)),
        }
    }

    /// Sign and big-endian magnitude bytes; zero carries signum 0 and no
    /// non-zero byte.
    fn big_integer(&mut self, signum: i32, magnitude: &Value) -> Result<BigInt, RenderError> {
        let sign = match signum {
            -1 => Sign::Minus,
            0 => Sign::NoSign,
            1 => Sign::Plus,
            _ => return Err(missing(BIG_INTEGER)),
        };
        let bytes: Vec<u8> = match magnitude {
            Value::Null => Vec::new(),
            Value::Object(id) => match self.graph.object(*id) {
                Object::Array { elements, .. } => {
                    if elements.len() > MAX_MAGNITUDE_BYTES {
                        return Err(RenderError::TooLarge(MAX_MAGNITUDE_BYTES));
                    }
                    self.charge(elements.len())?;
                    elements
                        .iter()
                        .map(|v| match v {
                            Value::Byte(b) => Ok(*b as u8),
                            _ => Err(missing(BIG_INTEGER)),
                        })
                        .collect::<Result<_, _>>()?
                }
                _ => return Err(missing(BIG_INTEGER)),
            },
            _ => return Err(missing(BIG_INTEGER)),
        };
        if (sign == Sign::NoSign) != bytes.iter().all(|b| *b == 0) {
            return Err(missing(BIG_INTEGER));
        }
        Ok(BigInt::from_bytes_be(sign, &bytes))
    }
}
