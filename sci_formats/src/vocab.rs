use anyhow::{Context, Result, anyhow, bail, ensure};
use byteorder::{BigEndian, ByteOrder, LittleEndian};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

impl Endian {
    fn read_u16(self, bytes: &[u8]) -> u16 {
        match self {
            Endian::Little => LittleEndian::read_u16(bytes),
            Endian::Big => BigEndian::read_u16(bytes),
        }
    }
}

/// How a name vocabulary stores its offset table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NameTableLayout {
    pub endian: Endian,
    /// Added to the stored count; the selector vocabulary stores the
    /// highest id rather than the number of entries.
    pub count_bias: u16,
}

impl NameTableLayout {
    pub const SELECTORS: NameTableLayout = NameTableLayout {
        endian: Endian::Little,
        count_bias: 1,
    };

    /// Mac releases starting with KQ7 write the selector table big-endian.
    pub const SELECTORS_BE: NameTableLayout = NameTableLayout {
        endian: Endian::Big,
        count_bias: 1,
    };

    pub const KERNEL: NameTableLayout = NameTableLayout {
        endian: Endian::Little,
        count_bias: 0,
    };
}

/// Parses a `u16 count, u16 offsets[count]` table where every offset points
/// at a `u16 length` followed by that many bytes of name.
pub fn parse_name_table(data: &[u8], layout: NameTableLayout) -> Result<Vec<String>> {
    ensure!(data.len() >= 2, "name table is too small to contain a count");

    let stored = layout.endian.read_u16(&data[0..2]);
    let count = stored as usize + layout.count_bias as usize;
    let table_end = 2 + count * 2;
    ensure!(
        table_end <= data.len(),
        "name table declares {count} entries but offset table is truncated"
    );

    let mut names = Vec::with_capacity(count);
    for index in 0..count {
        let slot = 2 + index * 2;
        let offset = layout.endian.read_u16(&data[slot..slot + 2]) as usize;
        let name = read_counted_string(data, offset, layout.endian)
            .with_context(|| format!("reading name {index}"))?;
        names.push(name);
    }

    Ok(names)
}

/// Parses the SCI1 kernel vocabulary: a `u16` count followed by that many
/// NUL-terminated names packed back to back, with no offset table.
pub fn parse_packed_name_table(data: &[u8]) -> Result<Vec<String>> {
    ensure!(data.len() >= 2, "name table is too small to contain a count");

    let count = LittleEndian::read_u16(&data[0..2]) as usize;
    let mut names = Vec::with_capacity(count);
    let mut cursor = 2;
    for index in 0..count {
        let rest = data.get(cursor..).unwrap_or_default();
        let Some(nul) = rest.iter().position(|&b| b == 0) else {
            bail!("name {index} at {cursor} is not terminated (table declares {count} names)");
        };
        names.push(String::from_utf8_lossy(&rest[..nul]).into_owned());
        cursor += nul + 1;
    }

    Ok(names)
}

fn read_counted_string(data: &[u8], offset: usize, endian: Endian) -> Result<String> {
    let len_end = offset
        .checked_add(2)
        .ok_or_else(|| anyhow!("name offset overflow"))?;
    ensure!(
        len_end <= data.len(),
        "name offset {offset} beyond table length {}",
        data.len()
    );
    let len = endian.read_u16(&data[offset..len_end]) as usize;
    let end = len_end + len;
    ensure!(
        end <= data.len(),
        "name at {offset} with length {len} runs past the table"
    );

    let bytes = &data[len_end..end];
    // Some vocabularies NUL-pad their names.
    let trimmed = match bytes.iter().position(|&b| b == 0) {
        Some(nul) => &bytes[..nul],
        None => bytes,
    };
    Ok(String::from_utf8_lossy(trimmed).into_owned())
}
