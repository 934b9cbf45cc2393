use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

use anyhow::{Result, anyhow, bail};

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Unknown(v) => *v,
        }
    }
}

/// End of Central Directory (EOCD) - 22 bytes minimum
pub struct EndOfCentralDirectory {
    pub disk_number: u16,
    pub disk_with_cd: u16,
    pub disk_entries: u16,
    pub total_entries: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
    pub comment_len: u16,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: &'static [u8] = b"PK\x05\x06";
    pub const SIZE: usize = 22;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            bail!("Invalid End of Central Directory");
        }

        if &data[0..4] != Self::SIGNATURE {
            bail!("Invalid End of Central Directory");
        }

        let mut cursor = Cursor::new(&data[4..]);

        Ok(Self {
            disk_number: cursor.read_u16::<LittleEndian>()?,
            disk_with_cd: cursor.read_u16::<LittleEndian>()?,
            disk_entries: cursor.read_u16::<LittleEndian>()?,
            total_entries: cursor.read_u16::<LittleEndian>()?,
            cd_size: cursor.read_u32::<LittleEndian>()?,
            cd_offset: cursor.read_u32::<LittleEndian>()?,
            comment_len: cursor.read_u16::<LittleEndian>()?,
        })
    }

    /// Serialize the record without a trailing archive comment.
    pub fn to_bytes(&self) -> std::io::Result<Vec<u8>> {
        let mut out = Vec::with_capacity(Self::SIZE);
        out.extend_from_slice(Self::SIGNATURE);
        out.write_u16::<LittleEndian>(self.disk_number)?;
        out.write_u16::<LittleEndian>(self.disk_with_cd)?;
        out.write_u16::<LittleEndian>(self.disk_entries)?;
        out.write_u16::<LittleEndian>(self.total_entries)?;
        out.write_u32::<LittleEndian>(self.cd_size)?;
        out.write_u32::<LittleEndian>(self.cd_offset)?;
        out.write_u16::<LittleEndian>(self.comment_len)?;
        Ok(out)
    }

    pub fn is_zip64(&self) -> bool {
        self.disk_entries == 0xFFFF
            || self.total_entries == 0xFFFF
            || self.cd_size == 0xFFFFFFFF
            || self.cd_offset == 0xFFFFFFFF
    }
}

/// ZIP64 End of Central Directory Locator - 20 bytes
pub struct Zip64EOCDLocator {
    pub disk_with_eocd64: u32,
    pub eocd64_offset: u64,
    pub total_disks: u32,
}

impl Zip64EOCDLocator {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x07";
    pub const SIZE: usize = 20;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE || &data[0..4] != Self::SIGNATURE {
            bail!("Invalid ZIP64 format");
        }

        let mut cursor = Cursor::new(&data[4..]);

        Ok(Self {
            disk_with_eocd64: cursor.read_u32::<LittleEndian>()?,
            eocd64_offset: cursor.read_u64::<LittleEndian>()?,
            total_disks: cursor.read_u32::<LittleEndian>()?,
        })
    }
}

/// ZIP64 End of Central Directory - 56 bytes minimum
pub struct Zip64EOCD {
    pub eocd64_size: u64,
    pub version_made_by: u16,
    pub version_needed: u16,
    pub disk_number: u32,
    pub disk_with_cd: u32,
    pub disk_entries: u64,
    pub total_entries: u64,
    pub cd_size: u64,
    pub cd_offset: u64,
}

impl Zip64EOCD {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x06";
    pub const MIN_SIZE: usize = 56;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::MIN_SIZE || &data[0..4] != Self::SIGNATURE {
            bail!("Invalid ZIP64 format");
        }

        let mut cursor = Cursor::new(&data[4..]);

        Ok(Self {
            eocd64_size: cursor.read_u64::<LittleEndian>()?,
            version_made_by: cursor.read_u16::<LittleEndian>()?,
            version_needed: cursor.read_u16::<LittleEndian>()?,
            disk_number: cursor.read_u32::<LittleEndian>()?,
            disk_with_cd: cursor.read_u32::<LittleEndian>()?,
            disk_entries: cursor.read_u64::<LittleEndian>()?,
            total_entries: cursor.read_u64::<LittleEndian>()?,
            cd_size: cursor.read_u64::<LittleEndian>()?,
            cd_offset: cursor.read_u64::<LittleEndian>()?,
        })
    }
}

/// Central Directory File Header (CDFH) - 46 bytes minimum
pub const CDFH_SIGNATURE: &[u8] = b"PK\x01\x02";
pub const CDFH_MIN_SIZE: usize = 46;

/// Local File Header (LFH) - 30 bytes
pub const LFH_SIGNATURE: &[u8] = b"PK\x03\x04";
pub const LFH_SIZE: usize = 30;

/// Data descriptor following entries with flag bit 3 - 16 bytes
pub const DATA_DESCRIPTOR_SIGNATURE: &[u8] = b"PK\x07\x08";
pub const DATA_DESCRIPTOR_SIZE: u64 = 16;

/// General purpose flag: entry is encrypted
pub const FLAG_ENCRYPTED: u16 = 0x0001;
/// General purpose flag: CRC and sizes follow the data in a descriptor
pub const FLAG_DATA_DESCRIPTOR: u16 = 0x0008;

/// Parsed Central Directory entry
#[derive(Debug, Clone)]
pub struct ZipFileEntry {
    pub file_name: String,
    pub raw_name: Vec<u8>,
    pub version_made_by: u16,
    pub version_needed: u16,
    pub flags: u16,
    pub compression_method: CompressionMethod,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub crc32: u32,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub extra_field: Vec<u8>,
    pub comment: Vec<u8>,
    pub internal_attrs: u16,
    pub external_attrs: u32,
    pub lfh_offset: u64,
}

impl ZipFileEntry {
    pub fn is_encrypted(&self) -> bool {
        self.flags & FLAG_ENCRYPTED != 0
    }
}

/// What an entry's Local File Header contributes beyond the Central Directory
#[derive(Debug, Clone)]
pub struct LocalHeader {
    pub extra_field: Vec<u8>,
    /// Absolute offset of the first payload byte
    pub data_offset: u64,
}

/// Everything needed to write one entry: the local header fields plus the
/// central directory metadata carried over from the source.
///
/// `extra_field` is the local header's extra field, the one alignment
/// padding is appended to. `central_extra_field` is copied through as is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryHeader {
    pub name: Vec<u8>,
    pub compression_method: CompressionMethod,
    pub extra_field: Vec<u8>,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub crc32: u32,
    pub version_made_by: u16,
    pub version_needed: u16,
    pub flags: u16,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub central_extra_field: Vec<u8>,
    pub comment: Vec<u8>,
    pub internal_attrs: u16,
    pub external_attrs: u32,
}

impl EntryHeader {
    /// A header with zeroed metadata, for building archives from scratch.
    pub fn new(name: &str, compression_method: CompressionMethod) -> Self {
        Self {
            name: name.as_bytes().to_vec(),
            compression_method,
            extra_field: Vec::new(),
            compressed_size: 0,
            uncompressed_size: 0,
            crc32: 0,
            version_made_by: 20,
            version_needed: 20,
            flags: 0,
            last_mod_time: 0,
            last_mod_date: 0x21, // 1980-01-01
            central_extra_field: Vec::new(),
            comment: Vec::new(),
            internal_attrs: 0,
            external_attrs: 0,
        }
    }

    /// Combine a central directory entry with its local extra field.
    pub fn from_entry(entry: &ZipFileEntry, local_extra: Vec<u8>) -> Self {
        Self {
            name: entry.raw_name.clone(),
            compression_method: entry.compression_method,
            extra_field: local_extra,
            compressed_size: entry.compressed_size,
            uncompressed_size: entry.uncompressed_size,
            crc32: entry.crc32,
            version_made_by: entry.version_made_by,
            version_needed: entry.version_needed,
            flags: entry.flags,
            last_mod_time: entry.last_mod_time,
            last_mod_date: entry.last_mod_date,
            central_extra_field: entry.extra_field.clone(),
            comment: entry.comment.clone(),
            internal_attrs: entry.internal_attrs,
            external_attrs: entry.external_attrs,
        }
    }

    /// Size of the local file header this entry is written with.
    pub fn local_header_size(&self) -> u64 {
        (LFH_SIZE + self.extra_field.len() + self.name.len()) as u64
    }

    pub fn display_name(&self) -> String {
        String::from_utf8_lossy(&self.name).into_owned()
    }

    /// Whether CRC and sizes are repeated in a descriptor after the data.
    pub fn has_data_descriptor(&self) -> bool {
        self.flags & FLAG_DATA_DESCRIPTOR != 0
    }

    /// Size of the descriptor written after the data, 0 when there is none.
    pub fn data_descriptor_size(&self) -> u64 {
        if self.has_data_descriptor() {
            DATA_DESCRIPTOR_SIZE
        } else {
            0
        }
    }

    /// Encode the Local File Header, sizes filled in even when a
    /// descriptor follows.
    pub fn local_header_bytes(&self) -> Result<Vec<u8>> {
        let name = self.display_name();
        let name_len = u16::try_from(self.name.len())
            .map_err(|_| anyhow!("{name}: file name too long"))?;
        let extra_len = u16::try_from(self.extra_field.len())
            .map_err(|_| anyhow!("{name}: local extra field too long"))?;

        let mut out = Vec::with_capacity(self.local_header_size() as usize);
        out.extend_from_slice(LFH_SIGNATURE);
        out.write_u16::<LittleEndian>(self.version_needed)?;
        out.write_u16::<LittleEndian>(self.flags)?;
        out.write_u16::<LittleEndian>(self.compression_method.as_u16())?;
        out.write_u16::<LittleEndian>(self.last_mod_time)?;
        out.write_u16::<LittleEndian>(self.last_mod_date)?;
        out.write_u32::<LittleEndian>(self.crc32)?;
        out.write_u32::<LittleEndian>(zip32(self.compressed_size, "compressed size")?)?;
        out.write_u32::<LittleEndian>(zip32(self.uncompressed_size, "uncompressed size")?)?;
        out.write_u16::<LittleEndian>(name_len)?;
        out.write_u16::<LittleEndian>(extra_len)?;
        out.extend_from_slice(&self.name);
        out.extend_from_slice(&self.extra_field);
        Ok(out)
    }

    /// Encode the data descriptor, signature included.
    pub fn data_descriptor_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(DATA_DESCRIPTOR_SIZE as usize);
        out.extend_from_slice(DATA_DESCRIPTOR_SIGNATURE);
        out.write_u32::<LittleEndian>(self.crc32)?;
        out.write_u32::<LittleEndian>(zip32(self.compressed_size, "compressed size")?)?;
        out.write_u32::<LittleEndian>(zip32(self.uncompressed_size, "uncompressed size")?)?;
        Ok(out)
    }

    /// Encode the Central Directory File Header for a local header written
    /// at `lfh_offset`.
    pub fn central_header_bytes(&self, lfh_offset: u64) -> Result<Vec<u8>> {
        let name = self.display_name();
        let extra_len = u16::try_from(self.central_extra_field.len())
            .map_err(|_| anyhow!("{name}: central extra field too long"))?;
        let comment_len = u16::try_from(self.comment.len())
            .map_err(|_| anyhow!("{name}: file comment too long"))?;

        let mut out = Vec::with_capacity(
            CDFH_MIN_SIZE + self.name.len() + self.central_extra_field.len() + self.comment.len(),
        );
        out.extend_from_slice(CDFH_SIGNATURE);
        out.write_u16::<LittleEndian>(self.version_made_by)?;
        out.write_u16::<LittleEndian>(self.version_needed)?;
        out.write_u16::<LittleEndian>(self.flags)?;
        out.write_u16::<LittleEndian>(self.compression_method.as_u16())?;
        out.write_u16::<LittleEndian>(self.last_mod_time)?;
        out.write_u16::<LittleEndian>(self.last_mod_date)?;
        out.write_u32::<LittleEndian>(self.crc32)?;
        out.write_u32::<LittleEndian>(zip32(self.compressed_size, "compressed size")?)?;
        out.write_u32::<LittleEndian>(zip32(self.uncompressed_size, "uncompressed size")?)?;
        out.write_u16::<LittleEndian>(self.name.len() as u16)?;
        out.write_u16::<LittleEndian>(extra_len)?;
        out.write_u16::<LittleEndian>(comment_len)?;
        out.write_u16::<LittleEndian>(0)?; // disk number start
        out.write_u16::<LittleEndian>(self.internal_attrs)?;
        out.write_u32::<LittleEndian>(self.external_attrs)?;
        out.write_u32::<LittleEndian>(zip32(lfh_offset, "local header offset")?)?;
        out.extend_from_slice(&self.name);
        out.extend_from_slice(&self.central_extra_field);
        out.extend_from_slice(&self.comment);
        Ok(out)
    }
}

/// Narrow a value to a zip32 field.
///
/// 0xFFFFFFFF is the ZIP64 marker, never a plain value.
pub fn zip32(value: u64, what: &str) -> Result<u32> {
    match u32::try_from(value) {
        Ok(v) if v != u32::MAX => Ok(v),
        _ => bail!("{what} {value} needs ZIP64, which is not written"),
    }
}
