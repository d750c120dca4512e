//! Read-only structural scan over one class file.

use std::collections::HashMap;

use super::{tags, ClassFileError, MAGIC, SOURCE_FILE_ATTR, SOURCE_FILE_ATTR_LEN};

/// Big-endian cursor over the raw class bytes.
struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn pos(&self) -> usize {
        self.pos
    }

    fn take(&mut self, len: usize, what: &'static str) -> Result<&'a [u8], ClassFileError> {
        if self.bytes.len() - self.pos < len {
            return Err(ClassFileError::Truncated { offset: self.pos, what });
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn skip(&mut self, len: usize, what: &'static str) -> Result<(), ClassFileError> {
        self.take(len, what).map(|_| ())
    }

    fn u8(&mut self, what: &'static str) -> Result<u8, ClassFileError> {
        Ok(self.take(1, what)?[0])
    }

    fn u16(&mut self, what: &'static str) -> Result<u16, ClassFileError> {
        let bytes = self.take(2, what)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn u32(&mut self, what: &'static str) -> Result<u32, ClassFileError> {
        let bytes = self.take(4, what)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

/// Location of an existing `SourceFile` attribute.
pub(crate) struct SourceFileAttr {
    /// Offset of the attribute's 2-byte payload (a UTF-8 pool index).
    pub payload_offset: usize,
    /// Pool index the payload currently refers to.
    pub value_index: u16,
}

/// Offsets and pool contents gathered in one pass over a class file.
///
/// Offsets are relative to the original byte buffer; the patcher accounts for
/// the shift introduced by spliced-in pool entries itself.
pub(crate) struct ClassScan {
    /// Declared pool count (number of entries plus one).
    pub pool_count: u16,
    pub pool_count_offset: usize,
    /// Offset just past the last constant pool entry.
    pub pool_end: usize,
    /// Decoded UTF-8 pool entries by index.
    pub utf8: HashMap<u16, String>,
    /// `Class` pool entries: index -> name index.
    pub classes: HashMap<u16, u16>,
    pub this_class: u16,
    pub attr_count: u16,
    pub attr_count_offset: usize,
    pub source_file: Option<SourceFileAttr>,
}

impl ClassScan {
    pub fn read(bytes: &[u8]) -> Result<Self, ClassFileError> {
        let mut reader = Reader::new(bytes);
        let magic = reader.u32("magic")?;
        if magic != MAGIC {
            return Err(ClassFileError::BadMagic { found: magic });
        }
        reader.skip(4, "version")?;

        let pool_count_offset = reader.pos();
        let pool_count = reader.u16("constant pool count")?;
        let mut utf8 = HashMap::new();
        let mut classes = HashMap::new();
        // u32 so the two-slot bump past index 65534 cannot wrap.
        let mut index: u32 = 1;
        while index < u32::from(pool_count) {
            let slot = index as u16;
            let tag = reader.u8("constant tag")?;
            match tag {
                tags::UTF8 => {
                    let len = usize::from(reader.u16("UTF-8 length")?);
                    let raw = reader.take(len, "UTF-8 bytes")?;
                    let value = std::str::from_utf8(raw)
                        .map_err(|_| ClassFileError::InvalidUtf8 { index: slot })?;
                    utf8.insert(slot, value.to_string());
                }
                tags::INTEGER | tags::FLOAT => reader.skip(4, "numeric constant")?,
                tags::LONG | tags::DOUBLE => {
                    // Eight-byte constants occupy two pool slots.
                    reader.skip(8, "wide numeric constant")?;
                    index += 1;
                }
                tags::CLASS => {
                    let name_index = reader.u16("class name index")?;
                    classes.insert(slot, name_index);
                }
                tags::STRING | tags::METHOD_TYPE | tags::MODULE | tags::PACKAGE => {
                    reader.skip(2, "single-index constant")?
                }
                tags::FIELD_REF
                | tags::METHOD_REF
                | tags::INTERFACE_METHOD_REF
                | tags::NAME_AND_TYPE
                | tags::DYNAMIC
                | tags::INVOKE_DYNAMIC => reader.skip(4, "double-index constant")?,
                tags::METHOD_HANDLE => reader.skip(3, "method handle constant")?,
                tag => return Err(ClassFileError::UnknownPoolTag { tag, index: slot }),
            }
            index += 1;
        }
        let pool_end = reader.pos();

        reader.skip(2, "access flags")?;
        let this_class = reader.u16("this_class")?;
        reader.skip(2, "super_class")?;
        let interfaces = usize::from(reader.u16("interface count")?);
        reader.skip(interfaces * 2, "interface table")?;

        skip_members(&mut reader)?; // fields
        skip_members(&mut reader)?; // methods

        let attr_count_offset = reader.pos();
        let attr_count = reader.u16("class attribute count")?;
        let mut source_file = None;
        for _ in 0..attr_count {
            let name_index = reader.u16("attribute name index")?;
            let declared_len = reader.u32("attribute length")?;
            let is_source_file =
                utf8.get(&name_index).is_some_and(|name| name == SOURCE_FILE_ATTR);
            if is_source_file && source_file.is_none() {
                if declared_len != SOURCE_FILE_ATTR_LEN {
                    return Err(ClassFileError::BadAttributeLength { found: declared_len });
                }
                let payload_offset = reader.pos();
                let value_index = reader.u16("SourceFile value index")?;
                source_file = Some(SourceFileAttr { payload_offset, value_index });
            } else {
                reader.skip(declared_len as usize, "attribute payload")?;
            }
        }
        // The attribute table is the last structure in a class file.
        if reader.pos() != bytes.len() {
            return Err(ClassFileError::TrailingBytes { extra: bytes.len() - reader.pos() });
        }

        Ok(Self {
            pool_count,
            pool_count_offset,
            pool_end,
            utf8,
            classes,
            this_class,
            attr_count,
            attr_count_offset,
            source_file,
        })
    }

    /// UTF-8 pool entry at `index`, or a typed reference error.
    pub fn utf8_at(&self, index: u16, expected: &'static str) -> Result<&str, ClassFileError> {
        self.utf8
            .get(&index)
            .map(String::as_str)
            .ok_or(ClassFileError::BadPoolRef { index, expected })
    }

    /// Binary name of the declared type, resolved through `this_class`.
    pub fn class_name(&self) -> Result<&str, ClassFileError> {
        let name_index = self.classes.get(&self.this_class).copied().ok_or(
            ClassFileError::BadPoolRef { index: self.this_class, expected: "class entry" },
        )?;
        self.utf8_at(name_index, "UTF-8 class name")
    }

    /// Lowest pool index already holding `value`, if any.
    pub fn find_utf8(&self, value: &str) -> Option<u16> {
        (1..self.pool_count).find(|index| self.utf8.get(index).is_some_and(|held| held == value))
    }
}

/// Skip a field or method table, honoring each declared attribute length.
fn skip_members(reader: &mut Reader<'_>) -> Result<(), ClassFileError> {
    let count = reader.u16("member count")?;
    for _ in 0..count {
        reader.skip(6, "member header")?;
        let attrs = reader.u16("member attribute count")?;
        for _ in 0..attrs {
            reader.skip(2, "attribute name index")?;
            let declared_len = reader.u32("attribute length")?;
            reader.skip(declared_len as usize, "attribute payload")?;
        }
    }
    Ok(())
}
