// Variable-length integer encoding
// Length-prefixed big-endian form used by the container footer and the
// collection serializer: [no_bytes: u8][value bytes, most significant first]

use std::io::{self, Read, Write};

/// Write a value with variable-length encoding. Returns bytes written.
pub fn write_varint<W: Write>(writer: &mut W, value: u64) -> io::Result<usize> {
    let mut no_bytes = 0u8;
    let mut tmp = value;
    while tmp > 0 {
        no_bytes += 1;
        tmp >>= 8;
    }

    if no_bytes == 0 {
        writer.write_all(&[0])?;
        return Ok(1);
    }

    writer.write_all(&[no_bytes])?;
    for i in (0..no_bytes).rev() {
        let byte = ((value >> (i * 8)) & 0xff) as u8;
        writer.write_all(&[byte])?;
    }

    Ok((no_bytes + 1) as usize)
}

/// Read a value with variable-length encoding. Returns (value, bytes_read).
pub fn read_varint<R: Read>(reader: &mut R) -> io::Result<(u64, usize)> {
    let mut no_bytes_buf = [0u8; 1];
    reader.read_exact(&mut no_bytes_buf)?;
    let no_bytes = no_bytes_buf[0];

    if no_bytes == 0 {
        return Ok((0, 1));
    }
    if no_bytes > 8 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("varint length prefix {} exceeds 8", no_bytes),
        ));
    }

    let mut value = 0u64;
    for _ in 0..no_bytes {
        let mut byte_buf = [0u8; 1];
        reader.read_exact(&mut byte_buf)?;
        value = (value << 8) | byte_buf[0] as u64;
    }

    Ok((value, (no_bytes + 1) as usize))
}

/// Write a fixed 8-byte little-endian unsigned integer
pub fn write_fixed_u64<W: Write>(writer: &mut W, value: u64) -> io::Result<usize> {
    writer.write_all(&value.to_le_bytes())?;
    Ok(8)
}

/// Read a fixed 8-byte little-endian unsigned integer
pub fn read_fixed_u64<R: Read>(reader: &mut R) -> io::Result<u64> {
    let mut bytes = [0u8; 8];
    reader.read_exact(&mut bytes)?;
    Ok(u64::from_le_bytes(bytes))
}

/// Append a varint to a byte vector
pub fn encode_varint(buf: &mut Vec<u8>, value: u64) {
    write_varint(buf, value).expect("writing to Vec cannot fail");
}

/// Read a varint from a byte slice, returns (value, bytes_consumed)
pub fn decode_varint(bytes: &[u8]) -> io::Result<(u64, usize)> {
    let mut cursor = std::io::Cursor::new(bytes);
    read_varint(&mut cursor)
}

/// Zigzag map a signed value onto an unsigned one (small magnitudes stay small)
#[inline]
pub fn zigzag_encode(x: i64) -> u64 {
    ((x << 1) ^ (x >> 63)) as u64
}

/// Inverse of [`zigzag_encode`]
#[inline]
pub fn zigzag_decode(v: u64) -> i64 {
    ((v >> 1) as i64) ^ -((v & 1) as i64)
}
