//! Versioned binary wire format for [`FrameRecord`].
//!
//! Layout (all integers little-endian):
//!
//! ```text
//! magic "FSTR" | version u8
//! session_id   u16 len + UTF-8
//! frame_index  u64
//! image        u32 len + bytes
//! faces        u16 count + count × (i32 x, i32 y, i32 w, i32 h)
//! face_count   u32
//! motion       9 × f64, row-major
//! stretch      4 × i32 (in min, in max, out min, out max) + f64 runtime
//! face_ms      f64
//! motion_ms    f64
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

use crate::preprocessing::histogram_stats::HistogramStats;
use crate::shared::face_box::FaceBox;
use crate::shared::motion_transform::MotionTransform;
use crate::telemetry::domain::frame_record::FrameRecord;

pub const MAGIC: &[u8; 4] = b"FSTR";
pub const VERSION: u8 = 1;

const FACE_BYTES: usize = 16;
const FIXED_TAIL_BYTES: usize = 4 + 9 * 8 + 4 * 4 + 8 + 8 + 8;

#[derive(Error, Debug, PartialEq)]
pub enum CodecError {
    #[error("bad magic bytes")]
    BadMagic,
    #[error("unsupported wire version {0}")]
    UnsupportedVersion(u8),
    #[error("truncated record while reading {0}")]
    Truncated(&'static str),
    #[error("session id is not valid UTF-8")]
    InvalidSessionId(#[from] std::str::Utf8Error),
    #[error("motion matrix is not a finite affine transform")]
    InvalidMatrix,
    #[error("{0} trailing bytes after record")]
    TrailingBytes(usize),
    #[error("{field} too long to encode ({len})")]
    TooLong { field: &'static str, len: usize },
}

/// Serializes a record. Fails only if a length does not fit its prefix.
pub fn encode(record: &FrameRecord) -> Result<Bytes, CodecError> {
    let session = record.session_id.as_bytes();
    let session_len = u16::try_from(session.len()).map_err(|_| CodecError::TooLong {
        field: "session_id",
        len: session.len(),
    })?;
    let image_len = u32::try_from(record.image_payload.len()).map_err(|_| CodecError::TooLong {
        field: "image",
        len: record.image_payload.len(),
    })?;
    let face_len = u16::try_from(record.faces.len()).map_err(|_| CodecError::TooLong {
        field: "faces",
        len: record.faces.len(),
    })?;

    let mut buf = BytesMut::with_capacity(
        MAGIC.len()
            + 1
            + 2
            + session.len()
            + 8
            + 4
            + record.image_payload.len()
            + 2
            + record.faces.len() * FACE_BYTES
            + FIXED_TAIL_BYTES,
    );

    buf.put_slice(MAGIC);
    buf.put_u8(VERSION);
    buf.put_u16_le(session_len);
    buf.put_slice(session);
    buf.put_u64_le(record.frame_index);
    buf.put_u32_le(image_len);
    buf.put_slice(&record.image_payload);
    buf.put_u16_le(face_len);
    for face in &record.faces {
        buf.put_i32_le(face.x);
        buf.put_i32_le(face.y);
        buf.put_i32_le(face.w);
        buf.put_i32_le(face.h);
    }
    buf.put_u32_le(record.face_count);
    for v in record.motion.to_row_major() {
        buf.put_f64_le(v);
    }
    let stats = &record.stretch_stats;
    buf.put_i32_le(stats.input_min);
    buf.put_i32_le(stats.input_max);
    buf.put_i32_le(stats.output_min);
    buf.put_i32_le(stats.output_max);
    buf.put_f64_le(stats.runtime_ms);
    buf.put_f64_le(record.face_runtime_ms);
    buf.put_f64_le(record.transform_runtime_ms);

    Ok(buf.freeze())
}

/// Parses one datagram. Every malformed input is a [`CodecError`].
pub fn decode(mut buf: &[u8]) -> Result<FrameRecord, CodecError> {
    let buf = &mut buf;

    need(buf, MAGIC.len() + 1, "header")?;
    let mut magic = [0u8; 4];
    buf.copy_to_slice(&mut magic);
    if &magic != MAGIC {
        return Err(CodecError::BadMagic);
    }
    let version = buf.get_u8();
    if version != VERSION {
        return Err(CodecError::UnsupportedVersion(version));
    }

    need(buf, 2, "session_id")?;
    let session_len = buf.get_u16_le() as usize;
    need(buf, session_len, "session_id")?;
    let session_id = std::str::from_utf8(&buf[..session_len])?.to_owned();
    buf.advance(session_len);

    need(buf, 8, "frame_index")?;
    let frame_index = buf.get_u64_le();

    need(buf, 4, "image")?;
    let image_len = buf.get_u32_le() as usize;
    need(buf, image_len, "image")?;
    let image_payload = buf[..image_len].to_vec();
    buf.advance(image_len);

    need(buf, 2, "faces")?;
    let face_len = buf.get_u16_le() as usize;
    need(buf, face_len * FACE_BYTES, "faces")?;
    let faces: Vec<FaceBox> = (0..face_len)
        .map(|_| {
            FaceBox::new(
                buf.get_i32_le(),
                buf.get_i32_le(),
                buf.get_i32_le(),
                buf.get_i32_le(),
            )
        })
        .collect();

    need(buf, FIXED_TAIL_BYTES, "tail")?;
    let face_count = buf.get_u32_le();
    let mut values = [0.0f64; 9];
    for v in &mut values {
        *v = buf.get_f64_le();
    }
    let motion = MotionTransform::from_row_major(values).ok_or(CodecError::InvalidMatrix)?;
    let stretch_stats = HistogramStats {
        input_min: buf.get_i32_le(),
        input_max: buf.get_i32_le(),
        output_min: buf.get_i32_le(),
        output_max: buf.get_i32_le(),
        runtime_ms: buf.get_f64_le(),
    };
    let face_runtime_ms = buf.get_f64_le();
    let transform_runtime_ms = buf.get_f64_le();

    if buf.has_remaining() {
        return Err(CodecError::TrailingBytes(buf.remaining()));
    }

    Ok(FrameRecord {
        session_id,
        frame_index,
        image_payload,
        faces,
        face_count,
        motion,
        stretch_stats,
        face_runtime_ms,
        transform_runtime_ms,
    })
}

fn need(buf: &&[u8], n: usize, field: &'static str) -> Result<(), CodecError> {
    if buf.len() < n {
        Err(CodecError::Truncated(field))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn record() -> FrameRecord {
        FrameRecord {
            session_id: "lecture_01".to_string(),
            frame_index: 42,
            image_payload: vec![0xFF, 0xD8, 1, 2, 3, 0xFF, 0xD9],
            faces: vec![FaceBox::new(10, 20, 30, 40), FaceBox::new(-3, 5, 12, 12)],
            face_count: 2,
            motion: MotionTransform::translation(1.5, -0.25),
            stretch_stats: HistogramStats::new(12, 240, 0.07),
            face_runtime_ms: 8.31,
            transform_runtime_ms: 1.92,
        }
    }

    #[test]
    fn test_round_trip() {
        let original = record();
        let bytes = encode(&original).unwrap();
        assert_eq!(decode(&bytes).unwrap(), original);
    }

    #[test]
    fn test_round_trip_empty_collections() {
        let original = FrameRecord {
            session_id: String::new(),
            image_payload: Vec::new(),
            faces: Vec::new(),
            face_count: 0,
            motion: MotionTransform::identity(),
            ..record()
        };
        let bytes = encode(&original).unwrap();
        assert_eq!(decode(&bytes).unwrap(), original);
    }

    #[test]
    fn test_header_layout() {
        let bytes = encode(&record()).unwrap();
        assert_eq!(&bytes[..4], b"FSTR");
        assert_eq!(bytes[4], VERSION);
        assert_eq!(u16::from_le_bytes([bytes[5], bytes[6]]), 10);
        assert_eq!(&bytes[7..17], b"lecture_01");
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = encode(&record()).unwrap().to_vec();
        bytes[0] = b'X';
        assert_eq!(decode(&bytes), Err(CodecError::BadMagic));
    }

    #[test]
    fn test_unsupported_version() {
        let mut bytes = encode(&record()).unwrap().to_vec();
        bytes[4] = 9;
        assert_eq!(decode(&bytes), Err(CodecError::UnsupportedVersion(9)));
    }

    #[rstest]
    #[case::empty(0)]
    #[case::header_only(5)]
    #[case::mid_session(9)]
    #[case::mid_image(30)]
    fn test_truncated_prefix(#[case] len: usize) {
        let bytes = encode(&record()).unwrap();
        assert!(matches!(decode(&bytes[..len]), Err(CodecError::Truncated(_))));
    }

    #[test]
    fn test_missing_last_byte() {
        let bytes = encode(&record()).unwrap();
        assert_eq!(
            decode(&bytes[..bytes.len() - 1]),
            Err(CodecError::Truncated("tail"))
        );
    }

    #[test]
    fn test_trailing_bytes() {
        let mut bytes = encode(&record()).unwrap().to_vec();
        bytes.extend_from_slice(&[0, 0, 0]);
        assert_eq!(decode(&bytes), Err(CodecError::TrailingBytes(3)));
    }

    #[test]
    fn test_invalid_utf8_session() {
        let mut bytes = encode(&record()).unwrap().to_vec();
        bytes[7] = 0xFF;
        assert!(matches!(decode(&bytes), Err(CodecError::InvalidSessionId(_))));
    }

    #[test]
    fn test_non_finite_matrix_rejected() {
        let bytes = encode(&record()).unwrap().to_vec();
        // motion starts after face_count; tail is fixed-size from the end
        let motion_start = bytes.len() - FIXED_TAIL_BYTES + 4;
        let mut corrupted = bytes.clone();
        corrupted[motion_start..motion_start + 8].copy_from_slice(&f64::NAN.to_le_bytes());
        assert_eq!(decode(&corrupted), Err(CodecError::InvalidMatrix));

        let mut not_affine = bytes;
        let last = motion_start + 8 * 8;
        not_affine[last..last + 8].copy_from_slice(&2.0f64.to_le_bytes());
        assert_eq!(decode(&not_affine), Err(CodecError::InvalidMatrix));
    }

    #[test]
    fn test_session_id_too_long() {
        let long = FrameRecord {
            session_id: "x".repeat(u16::MAX as usize + 1),
            ..record()
        };
        assert!(matches!(
            encode(&long),
            Err(CodecError::TooLong { field: "session_id", .. })
        ));
    }
}
