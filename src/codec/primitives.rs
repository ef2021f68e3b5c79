//! Length-prefixed strings, validated names, and width-dispatched integers —
//! the handful of composite reads/writes shared by the schema codec
//! (`codec::reader`/`codec::writer`) and the post-handshake value codec in
//! `sender`/`receiver`. Everything here is generic over any `AsyncRead`/`AsyncWrite`,
//! so it works equally against a raw transport or a [`super::hashing::HashingReader`].

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Result, RmcError};
use crate::schema::assert_name;

async fn read_exact_sized(stream: &mut (impl AsyncRead + Unpin), n: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; n];
    stream.read_exact(&mut buf).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            RmcError::ShortRead {
                expected: n,
                actual: 0,
                offset: 0,
            }
        } else {
            RmcError::Io(e)
        }
    })?;
    Ok(buf)
}

pub async fn read_constant(stream: &mut (impl AsyncRead + Unpin), expected: &[u8]) -> Result<()> {
    let got = read_exact_sized(stream, expected.len()).await?;
    if got != expected {
        return Err(RmcError::InvalidSchema(format!(
            "expected constant {expected:02x?}, got {got:02x?}"
        )));
    }
    Ok(())
}

pub async fn write_constant(stream: &mut (impl AsyncWrite + Unpin), data: &[u8]) -> Result<()> {
    stream.write_all(data).await?;
    Ok(())
}

pub async fn read_bytes(stream: &mut (impl AsyncRead + Unpin)) -> Result<Vec<u8>> {
    let len = stream.read_u32().await? as usize;
    read_exact_sized(stream, len).await
}

pub async fn write_bytes(stream: &mut (impl AsyncWrite + Unpin), data: &[u8]) -> Result<()> {
    stream.write_u32(data.len() as u32).await?;
    stream.write_all(data).await?;
    Ok(())
}

pub async fn read_string(stream: &mut (impl AsyncRead + Unpin)) -> Result<String> {
    Ok(String::from_utf8(read_bytes(stream).await?)?)
}

pub async fn write_string(stream: &mut (impl AsyncWrite + Unpin), s: &str) -> Result<()> {
    write_bytes(stream, s.as_bytes()).await
}

pub async fn read_name(stream: &mut (impl AsyncRead + Unpin)) -> Result<String> {
    let name = read_string(stream).await?;
    assert_name(&name)?;
    Ok(name)
}

pub async fn write_name(stream: &mut (impl AsyncWrite + Unpin), name: &str) -> Result<()> {
    assert_name(name)?;
    write_string(stream, name).await
}

fn check_width(nbytes: u8) -> Result<()> {
    if matches!(nbytes, 1 | 2 | 4 | 8) {
        Ok(())
    } else {
        Err(RmcError::InvalidSchema(format!(
            "integers have to be 1, 2, 4 or 8 bytes long, got {nbytes}"
        )))
    }
}

pub async fn read_signed(stream: &mut (impl AsyncRead + Unpin), nbytes: u8) -> Result<i64> {
    check_width(nbytes)?;
    Ok(match nbytes {
        1 => stream.read_i8().await? as i64,
        2 => stream.read_i16().await? as i64,
        4 => stream.read_i32().await? as i64,
        _ => stream.read_i64().await?,
    })
}

fn out_of_range(nbytes: u8, value: i64) -> RmcError {
    RmcError::InvalidSchema(format!(
        "value {value} does not fit in a {nbytes}-byte signed integer"
    ))
}

pub async fn write_signed(stream: &mut (impl AsyncWrite + Unpin), nbytes: u8, value: i64) -> Result<()> {
    check_width(nbytes)?;
    match nbytes {
        1 => stream
            .write_i8(i8::try_from(value).map_err(|_| out_of_range(nbytes, value))?)
            .await?,
        2 => stream
            .write_i16(i16::try_from(value).map_err(|_| out_of_range(nbytes, value))?)
            .await?,
        4 => stream
            .write_i32(i32::try_from(value).map_err(|_| out_of_range(nbytes, value))?)
            .await?,
        _ => stream.write_i64(value).await?,
    }
    Ok(())
}

pub async fn read_unsigned(stream: &mut (impl AsyncRead + Unpin), nbytes: u8) -> Result<u64> {
    check_width(nbytes)?;
    Ok(match nbytes {
        1 => stream.read_u8().await? as u64,
        2 => stream.read_u16().await? as u64,
        4 => stream.read_u32().await? as u64,
        _ => stream.read_u64().await?,
    })
}

fn out_of_range_unsigned(nbytes: u8, value: u64) -> RmcError {
    RmcError::InvalidSchema(format!(
        "value {value} does not fit in a {nbytes}-byte unsigned integer"
    ))
}

pub async fn write_unsigned(stream: &mut (impl AsyncWrite + Unpin), nbytes: u8, value: u64) -> Result<()> {
    check_width(nbytes)?;
    match nbytes {
        1 => stream
            .write_u8(u8::try_from(value).map_err(|_| out_of_range_unsigned(nbytes, value))?)
            .await?,
        2 => stream
            .write_u16(u16::try_from(value).map_err(|_| out_of_range_unsigned(nbytes, value))?)
            .await?,
        4 => stream
            .write_u32(u32::try_from(value).map_err(|_| out_of_range_unsigned(nbytes, value))?)
            .await?,
        _ => stream.write_u64(value).await?,
    }
    Ok(())
}
