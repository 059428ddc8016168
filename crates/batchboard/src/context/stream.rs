//! Parser for the Java Object Serialization Stream Protocol, version 5.
//!
//! The result is an arena-backed [`Graph`]: class descriptors and objects are
//! addressed by index and back-references resolve to the same index, so
//! shared and cyclic object graphs come out of the parser intact. Nothing
//! here knows what any particular class means; that lives in `interpret`.

use crate::context::error::DecodeError;

pub const STREAM_MAGIC: u16 = 0xACED;
pub const STREAM_VERSION: u16 = 5;
pub const BASE_WIRE_HANDLE: i32 = 0x7E_0000;

/// Deepest object / class-descriptor nesting the parser follows.
pub const MAX_DEPTH: usize = 128;

pub mod tc {
    pub const NULL: u8 = 0x70;
    pub const REFERENCE: u8 = 0x71;
    pub const CLASSDESC: u8 = 0x72;
    pub const OBJECT: u8 = 0x73;
    pub const STRING: u8 = 0x74;
    pub const ARRAY: u8 = 0x75;
    pub const CLASS: u8 = 0x76;
    pub const BLOCKDATA: u8 = 0x77;
    pub const ENDBLOCKDATA: u8 = 0x78;
    pub const RESET: u8 = 0x79;
    pub const BLOCKDATALONG: u8 = 0x7A;
    pub const EXCEPTION: u8 = 0x7B;
    pub const LONGSTRING: u8 = 0x7C;
    pub const PROXYCLASSDESC: u8 = 0x7D;
    pub const ENUM: u8 = 0x7E;
}

pub const SC_WRITE_METHOD: u8 = 0x01;
pub const SC_SERIALIZABLE: u8 = 0x02;
pub const SC_EXTERNALIZABLE: u8 = 0x04;
pub const SC_BLOCK_DATA: u8 = 0x08;
pub const SC_ENUM: u8 = 0x10;

// ----------------------------
// Byte reader
// ----------------------------

/// Big-endian cursor over a byte slice. Every read is bounds-checked.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn peek(&self) -> Option<u8> {
        self.buf.get(self.pos).copied()
    }

    pub fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.buf.len())
            .ok_or(DecodeError::UnexpectedEof(self.pos))?;
        let out = &self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn u8(&mut self) -> Result<u8, DecodeError> {
        Ok(u8::from_be_bytes(self.array()?))
    }

    pub fn i8(&mut self) -> Result<i8, DecodeError> {
        Ok(i8::from_be_bytes(self.array()?))
    }

    pub fn u16(&mut self) -> Result<u16, DecodeError> {
        Ok(u16::from_be_bytes(self.array()?))
    }

    pub fn i16(&mut self) -> Result<i16, DecodeError> {
        Ok(i16::from_be_bytes(self.array()?))
    }

    pub fn i32(&mut self) -> Result<i32, DecodeError> {
        Ok(i32::from_be_bytes(self.array()?))
    }

    pub fn i64(&mut self) -> Result<i64, DecodeError> {
        Ok(i64::from_be_bytes(self.array()?))
    }

    pub fn f32(&mut self) -> Result<f32, DecodeError> {
        Ok(f32::from_be_bytes(self.array()?))
    }

    pub fn f64(&mut self) -> Result<f64, DecodeError> {
        Ok(f64::from_be_bytes(self.array()?))
    }

    /// `DataOutput.writeUTF` text: u16 byte length, then modified UTF-8.
    pub fn utf(&mut self) -> Result<String, DecodeError> {
        let len = self.u16()? as usize;
        decode_modified_utf8(self.take(len)?)
    }

    /// `TC_LONGSTRING` body: i64 byte length, then modified UTF-8.
    pub fn long_utf(&mut self) -> Result<String, DecodeError> {
        let declared = self.i64()?;
        if declared < 0 {
            return Err(DecodeError::NegativeLength(declared));
        }
        let len = self.checked_len(declared as u64, 1)?;
        decode_modified_utf8(self.take(len)?)
    }

    /// Validates a declared element count against what is left in the
    /// buffer before anything is allocated for it.
    pub fn checked_len(&self, declared: u64, unit: usize) -> Result<usize, DecodeError> {
        let remaining = self.remaining();
        let fits = declared
            .checked_mul(unit.max(1) as u64)
            .is_some_and(|bytes| bytes <= remaining as u64);
        if fits {
            Ok(declared as usize)
        } else {
            Err(DecodeError::LengthOverrun {
                declared,
                remaining,
            })
        }
    }
}

/// Java's modified UTF-8: NUL as `C0 80`, supplementary characters as two
/// separately encoded UTF-16 surrogates, no 4-byte forms.
pub fn decode_modified_utf8(bytes: &[u8]) -> Result<String, DecodeError> {
    fn cont(bytes: &[u8], i: usize) -> Result<u16, DecodeError> {
        match bytes.get(i) {
            Some(&b) if b & 0xC0 == 0x80 => Ok((b & 0x3F) as u16),
            _ => Err(DecodeError::BadUtf8),
        }
    }

    let mut units = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match b >> 4 {
            0..=7 => {
                units.push(b as u16);
                i += 1;
            }
            12 | 13 => {
                units.push(((b as u16 & 0x1F) << 6) | cont(bytes, i + 1)?);
                i += 2;
            }
            14 => {
                units.push(
                    ((b as u16 & 0x0F) << 12) | (cont(bytes, i + 1)? << 6) | cont(bytes, i + 2)?,
                );
                i += 3;
            }
            _ => return Err(DecodeError::BadUtf8),
        }
    }
    Ok(String::from_utf16_lossy(&units))
}

// ----------------------------
// Graph
// ----------------------------

pub type ClassId = usize;
pub type ObjectId = usize;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Byte(i8),
    Char(u16),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Str(String),
    Object(ObjectId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDesc {
    pub name: String,
    pub type_code: u8,
    /// JVM type signature for object and array fields.
    pub class_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDesc {
    pub name: String,
    pub serial_version_uid: i64,
    pub flags: u8,
    pub fields: Vec<FieldDesc>,
    pub super_class: Option<ClassId>,
}

impl ClassDesc {
    pub fn has_flag(&self, flag: u8) -> bool {
        self.flags & flag != 0
    }
}

/// Data written by `writeObject`/`writeExternal` after the default fields.
#[derive(Debug, Clone, PartialEq)]
pub enum Annotation {
    /// Adjacent block-data records, concatenated.
    Block(Vec<u8>),
    Value(Value),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassData {
    pub class: ClassId,
    pub fields: Vec<(String, Value)>,
    pub annotation: Vec<Annotation>,
}

impl ClassData {
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.annotation.iter().filter_map(|a| match a {
            Annotation::Value(v) => Some(v),
            Annotation::Block(_) => None,
        })
    }

    pub fn block_data(&self) -> Vec<u8> {
        self.annotation
            .iter()
            .filter_map(|a| match a {
                Annotation::Block(b) => Some(b.as_slice()),
                Annotation::Value(_) => None,
            })
            .flatten()
            .copied()
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    /// Handle assigned, contents still being read.
    Pending,
    /// Per-class data ordered from the top-most serializable superclass down.
    Instance { class: ClassId, data: Vec<ClassData> },
    Array { class: ClassId, elements: Vec<Value> },
    Enum { class: ClassId, constant: String },
    Class(Option<ClassId>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Graph {
    pub classes: Vec<ClassDesc>,
    pub objects: Vec<Object>,
    pub root: Value,
}

impl Graph {
    pub fn class(&self, id: ClassId) -> &ClassDesc {
        &self.classes[id]
    }

    pub fn object(&self, id: ObjectId) -> &Object {
        &self.objects[id]
    }

    /// The class followed by its serializable superclasses, most derived first.
    pub fn chain(&self, class: ClassId) -> Vec<ClassId> {
        let mut chain = Vec::new();
        let mut next = Some(class);
        while let Some(id) = next {
            if chain.len() > self.classes.len() {
                break;
            }
            chain.push(id);
            next = self.classes[id].super_class;
        }
        chain
    }
}

// ----------------------------
// Parser
// ----------------------------

#[derive(Debug)]
enum Handle {
    Class(ClassId),
    Str(String),
    Object(ObjectId),
}

struct Parser<'a> {
    r: Reader<'a>,
    handles: Vec<Handle>,
    classes: Vec<ClassDesc>,
    objects: Vec<Object>,
}

/// Parses a complete stream and returns its first object.
pub fn parse(bytes: &[u8]) -> Result<Graph, DecodeError> {
    let mut p = Parser {
        r: Reader::new(bytes),
        handles: Vec::new(),
        classes: Vec::new(),
        objects: Vec::new(),
    };

    let magic = p.r.u16()?;
    let version = p.r.u16()?;
    if magic != STREAM_MAGIC || version != STREAM_VERSION {
        return Err(DecodeError::BadHeader { magic, version });
    }

    let root = p.read_root()?;
    Ok(Graph {
        classes: p.classes,
        objects: p.objects,
        root,
    })
}

impl<'a> Parser<'a> {
    fn read_root(&mut self) -> Result<Value, DecodeError> {
        loop {
            match self.r.peek() {
                None => return Err(DecodeError::Empty),
                // leading primitive data carries no object
                Some(tc::BLOCKDATA) | Some(tc::BLOCKDATALONG) => {
                    self.read_block()?;
                }
                Some(_) => return self.read_object(0),
            }
        }
    }

    fn read_object(&mut self, depth: usize) -> Result<Value, DecodeError> {
        if depth > MAX_DEPTH {
            return Err(DecodeError::TooDeep(MAX_DEPTH));
        }
        loop {
            let offset = self.r.position();
            let tag = self.r.u8()?;
            return match tag {
                tc::NULL => Ok(Value::Null),
                tc::REFERENCE => self.read_reference(),
                tc::OBJECT => self.read_new_object(depth, offset),
                tc::STRING => {
                    let s = self.r.utf()?;
                    self.handles.push(Handle::Str(s.clone()));
                    Ok(Value::Str(s))
                }
                tc::LONGSTRING => {
                    let s = self.r.long_utf()?;
                    self.handles.push(Handle::Str(s.clone()));
                    Ok(Value::Str(s))
                }
                tc::ARRAY => self.read_new_array(depth, offset),
                tc::ENUM => self.read_new_enum(depth, offset),
                tc::CLASS => {
                    let class = self.read_class_desc(depth + 1)?;
                    Ok(Value::Object(self.push_object(Object::Class(class))))
                }
                tc::RESET => {
                    self.handles.clear();
                    continue;
                }
                tc::EXCEPTION => Err(DecodeError::Exception),
                tc::CLASSDESC
                | tc::PROXYCLASSDESC
                | tc::BLOCKDATA
                | tc::BLOCKDATALONG
                | tc::ENDBLOCKDATA => Err(DecodeError::UnexpectedTag { tag, offset }),
                _ => Err(DecodeError::UnknownTag { tag, offset }),
            };
        }
    }

    fn lookup(&mut self) -> Result<(i32, &Handle), DecodeError> {
        let handle = self.r.i32()?;
        let found = handle
            .checked_sub(BASE_WIRE_HANDLE)
            .and_then(|idx| usize::try_from(idx).ok())
            .and_then(|idx| self.handles.get(idx));
        match found {
            Some(h) => Ok((handle, h)),
            None => Err(DecodeError::BadHandle(handle)),
        }
    }

    fn read_reference(&mut self) -> Result<Value, DecodeError> {
        match self.lookup()? {
            (_, Handle::Str(s)) => Ok(Value::Str(s.clone())),
            (_, Handle::Object(id)) => Ok(Value::Object(*id)),
            (handle, Handle::Class(_)) => Err(DecodeError::BadHandle(handle)),
        }
    }

    fn push_object(&mut self, object: Object) -> ObjectId {
        let id = self.objects.len();
        self.objects.push(object);
        self.handles.push(Handle::Object(id));
        id
    }

    fn read_class_desc(&mut self, depth: usize) -> Result<Option<ClassId>, DecodeError> {
        if depth > MAX_DEPTH {
            return Err(DecodeError::TooDeep(MAX_DEPTH));
        }
        let offset = self.r.position();
        let tag = self.r.u8()?;
        match tag {
            tc::NULL => Ok(None),
            tc::REFERENCE => match self.lookup()? {
                (_, Handle::Class(id)) => Ok(Some(*id)),
                (handle, _) => Err(DecodeError::BadHandle(handle)),
            },
            tc::CLASSDESC => self.read_new_class_desc(depth).map(Some),
            tc::PROXYCLASSDESC => self.read_proxy_class_desc(depth).map(Some),
            tc::OBJECT
            | tc::STRING
            | tc::ARRAY
            | tc::CLASS
            | tc::BLOCKDATA
            | tc::ENDBLOCKDATA
            | tc::RESET
            | tc::BLOCKDATALONG
            | tc::EXCEPTION
            | tc::LONGSTRING
            | tc::ENUM => Err(DecodeError::UnexpectedTag { tag, offset }),
            _ => Err(DecodeError::UnknownTag { tag, offset }),
        }
    }

    fn push_class(&mut self, name: String, serial_version_uid: i64) -> ClassId {
        let id = self.classes.len();
        self.classes.push(ClassDesc {
            name,
            serial_version_uid,
            flags: 0,
            fields: Vec::new(),
            super_class: None,
        });
        self.handles.push(Handle::Class(id));
        id
    }

    fn read_new_class_desc(&mut self, depth: usize) -> Result<ClassId, DecodeError> {
        let name = self.r.utf()?;
        let serial_version_uid = self.r.i64()?;
        let id = self.push_class(name, serial_version_uid);

        let flags = self.r.u8()?;
        let count = self.r.u16()?;
        // type code plus a two-byte name length at minimum
        let mut fields = Vec::with_capacity(self.r.checked_len(count as u64, 3)?);
        for _ in 0..count {
            let type_code = self.r.u8()?;
            let name = self.r.utf()?;
            let class_name = match type_code {
                b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' => None,
                b'L' | b'[' => match self.read_object(depth + 1)? {
                    Value::Str(s) => Some(s),
                    _ => return Err(DecodeError::BadFieldType(type_code)),
                },
                other => return Err(DecodeError::BadFieldType(other)),
            };
            fields.push(FieldDesc {
                name,
                type_code,
                class_name,
            });
        }

        self.read_annotation(depth)?;
        let super_class = self.read_class_desc(depth + 1)?;

        let desc = &mut self.classes[id];
        desc.flags = flags;
        desc.fields = fields;
        desc.super_class = super_class;
        Ok(id)
    }

    fn read_proxy_class_desc(&mut self, depth: usize) -> Result<ClassId, DecodeError> {
        let id = self.push_class("$Proxy".to_string(), 0);

        let count = self.r.i32()?;
        if count < 0 {
            return Err(DecodeError::NegativeLength(count as i64));
        }
        for _ in 0..self.r.checked_len(count as u64, 2)? {
            self.r.utf()?;
        }

        self.read_annotation(depth)?;
        let super_class = self.read_class_desc(depth + 1)?;

        let desc = &mut self.classes[id];
        desc.flags = SC_SERIALIZABLE;
        desc.super_class = super_class;
        Ok(id)
    }

    fn read_block(&mut self) -> Result<&'a [u8], DecodeError> {
        let offset = self.r.position();
        let len = match self.r.u8()? {
            tc::BLOCKDATA => self.r.u8()? as usize,
            tc::BLOCKDATALONG => {
                let len = self.r.i32()?;
                if len < 0 {
                    return Err(DecodeError::NegativeLength(len as i64));
                }
                len as usize
            }
            tag => return Err(DecodeError::UnexpectedTag { tag, offset }),
        };
        self.r.take(len)
    }

    /// Reads block data and objects up to and including `TC_ENDBLOCKDATA`.
    fn read_annotation(&mut self, depth: usize) -> Result<Vec<Annotation>, DecodeError> {
        let mut out = Vec::new();
        loop {
            match self.r.peek() {
                None => return Err(DecodeError::UnexpectedEof(self.r.position())),
                Some(tc::ENDBLOCKDATA) => {
                    self.r.u8()?;
                    return Ok(out);
                }
                Some(tc::BLOCKDATA) | Some(tc::BLOCKDATALONG) => {
                    let block = self.read_block()?;
                    match out.last_mut() {
                        Some(Annotation::Block(prev)) => prev.extend_from_slice(block),
                        _ => out.push(Annotation::Block(block.to_vec())),
                    }
                }
                Some(_) => out.push(Annotation::Value(self.read_object(depth + 1)?)),
            }
        }
    }

    fn class_chain(&self, class: ClassId) -> Result<Vec<ClassId>, DecodeError> {
        let mut chain = Vec::new();
        let mut next = Some(class);
        while let Some(id) = next {
            if chain.contains(&id) {
                return Err(DecodeError::ClassCycle(self.classes[class].name.clone()));
            }
            chain.push(id);
            next = self.classes[id].super_class;
        }
        Ok(chain)
    }

    fn read_new_object(&mut self, depth: usize, offset: usize) -> Result<Value, DecodeError> {
        let class = self
            .read_class_desc(depth + 1)?
            .ok_or(DecodeError::UnexpectedTag {
                tag: tc::NULL,
                offset,
            })?;
        let id = self.push_object(Object::Pending);

        let chain = self.class_chain(class)?;
        let mut data = Vec::with_capacity(chain.len());
        for &cid in chain.iter().rev() {
            data.push(self.read_class_data(cid, depth)?);
        }

        self.objects[id] = Object::Instance { class, data };
        Ok(Value::Object(id))
    }

    fn read_class_data(&mut self, class: ClassId, depth: usize) -> Result<ClassData, DecodeError> {
        let flags = self.classes[class].flags;

        if flags & SC_EXTERNALIZABLE != 0 {
            if flags & SC_BLOCK_DATA == 0 {
                return Err(DecodeError::UnframedExternalizable(
                    self.classes[class].name.clone(),
                ));
            }
            return Ok(ClassData {
                class,
                fields: Vec::new(),
                annotation: self.read_annotation(depth)?,
            });
        }

        let mut fields = Vec::new();
        if flags & SC_SERIALIZABLE != 0 {
            for i in 0..self.classes[class].fields.len() {
                let field = &self.classes[class].fields[i];
                let (name, type_code) = (field.name.clone(), field.type_code);
                let value = self.read_value(type_code, depth)?;
                fields.push((name, value));
            }
        }

        let annotation = if flags & SC_SERIALIZABLE != 0 && flags & SC_WRITE_METHOD != 0 {
            self.read_annotation(depth)?
        } else {
            Vec::new()
        };

        Ok(ClassData {
            class,
            fields,
            annotation,
        })
    }

    fn read_value(&mut self, type_code: u8, depth: usize) -> Result<Value, DecodeError> {
        Ok(match type_code {
            b'B' => Value::Byte(self.r.i8()?),
            b'C' => Value::Char(self.r.u16()?),
            b'D' => Value::Double(self.r.f64()?),
            b'F' => Value::Float(self.r.f32()?),
            b'I' => Value::Int(self.r.i32()?),
            b'J' => Value::Long(self.r.i64()?),
            b'S' => Value::Short(self.r.i16()?),
            b'Z' => Value::Bool(self.r.u8()? != 0),
            b'L' | b'[' => self.read_object(depth + 1)?,
            other => return Err(DecodeError::BadFieldType(other)),
        })
    }

    fn read_new_array(&mut self, depth: usize, offset: usize) -> Result<Value, DecodeError> {
        let class = self
            .read_class_desc(depth + 1)?
            .ok_or(DecodeError::UnexpectedTag {
                tag: tc::NULL,
                offset,
            })?;
        let id = self.push_object(Object::Pending);

        let declared = self.r.i32()?;
        if declared < 0 {
            return Err(DecodeError::NegativeLength(declared as i64));
        }
        let element = self.classes[class]
            .name
            .as_bytes()
            .get(1)
            .copied()
            .unwrap_or(b'L');
        let width = match element {
            b'J' | b'D' => 8,
            b'I' | b'F' => 4,
            b'C' | b'S' => 2,
            _ => 1,
        };
        let len = self.r.checked_len(declared as u64, width)?;

        let mut elements = Vec::with_capacity(len);
        for _ in 0..len {
            elements.push(self.read_value(element, depth)?);
        }

        self.objects[id] = Object::Array { class, elements };
        Ok(Value::Object(id))
    }

    fn read_new_enum(&mut self, depth: usize, offset: usize) -> Result<Value, DecodeError> {
        let class = self
            .read_class_desc(depth + 1)?
            .ok_or(DecodeError::UnexpectedTag {
                tag: tc::NULL,
                offset,
            })?;
        let id = self.push_object(Object::Pending);

        let constant = match self.read_object(depth + 1)? {
            Value::Str(s) => s,
            _ => {
                return Err(DecodeError::UnexpectedTag {
                    tag: tc::ENUM,
                    offset,
                })
            }
        };

        self.objects[id] = Object::Enum { class, constant };
        Ok(Value::Object(id))
    }
}
