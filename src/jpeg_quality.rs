//! JPEG compression quality estimation from embedded quantization tables.
//!
//! The estimate inverts the IJG quality scaling: every coefficient of every
//! DQT table is divided by its quality-50 reference value, the ratios are
//! averaged and mapped back through `scale = 200 - 2q` (q >= 50) or
//! `scale = 5000 / q` (q < 50).

use serde::Serialize;

/// Quality-50 luminance table, natural (row-major) order.
const STD_LUMA: [u16; 64] = [
    16, 11, 10, 16, 24, 40, 51, 61, //
    12, 12, 14, 19, 26, 58, 60, 55, //
    14, 13, 16, 24, 40, 57, 69, 56, //
    14, 17, 22, 29, 51, 87, 80, 62, //
    18, 22, 37, 56, 68, 109, 103, 77, //
    24, 35, 55, 64, 81, 104, 113, 92, //
    49, 64, 78, 87, 103, 121, 120, 101, //
    72, 92, 95, 98, 112, 100, 103, 99,
];

/// Quality-50 chrominance table, natural order.
const STD_CHROMA: [u16; 64] = [
    17, 18, 24, 47, 99, 99, 99, 99, //
    18, 21, 26, 66, 99, 99, 99, 99, //
    24, 26, 56, 99, 99, 99, 99, 99, //
    47, 66, 99, 99, 99, 99, 99, 99, //
    99, 99, 99, 99, 99, 99, 99, 99, //
    99, 99, 99, 99, 99, 99, 99, 99, //
    99, 99, 99, 99, 99, 99, 99, 99, //
    99, 99, 99, 99, 99, 99, 99, 99,
];

/// Natural-order index of the k-th coefficient as stored in a DQT segment.
const ZIGZAG: [usize; 64] = [
    0, 1, 8, 16, 9, 2, 3, 10, 17, 24, 32, 25, 18, 11, 4, 5, 12, 19, 26, 33, 40, 48, 41, 34, 27,
    20, 13, 6, 7, 14, 21, 28, 35, 42, 49, 56, 57, 50, 43, 36, 29, 22, 15, 23, 30, 37, 44, 51, 58,
    59, 52, 45, 38, 31, 39, 46, 53, 60, 61, 54, 47, 55, 62, 63,
];

const SOI: u8 = 0xD8;
const EOI: u8 = 0xD9;
const SOS: u8 = 0xDA;
const DQT: u8 = 0xDB;
const SOF2: u8 = 0xC2;
const TEM: u8 = 0x01;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JpegQualityResult {
    Success {
        percent: u8,
        tables: usize,
        progressive: bool,
    },
    NotJpeg,
    Error {
        message: String,
    },
}

impl JpegQualityResult {
    pub fn cell(&self) -> String {
        match self {
            JpegQualityResult::Success { percent, .. } => format!("{percent}%"),
            JpegQualityResult::NotJpeg => "not a JPEG".to_string(),
            JpegQualityResult::Error { message } => format!("Error: {message}"),
        }
    }
}

#[derive(Debug, Clone)]
struct QuantTable {
    id: u8,
    precision: u8,
    values: [u16; 64],
}

#[derive(Debug, Default)]
struct MarkerScan {
    tables: Vec<QuantTable>,
    progressive: bool,
}

/// Estimates the encoding quality of `bytes`. Pure and total: malformed input
/// yields `Error`, never a panic.
pub fn analyze(bytes: &[u8]) -> JpegQualityResult {
    if bytes.len() < 2 || bytes[0] != 0xFF || bytes[1] != SOI {
        return JpegQualityResult::NotJpeg;
    }
    match scan_markers(bytes) {
        Ok(scan) => JpegQualityResult::Success {
            percent: estimate_quality(&scan.tables),
            tables: scan.tables.len(),
            progressive: scan.progressive,
        },
        Err(message) => JpegQualityResult::Error { message },
    }
}

fn scan_markers(bytes: &[u8]) -> Result<MarkerScan, String> {
    let len = bytes.len();
    let mut scan = MarkerScan::default();
    let mut pos = 2;

    loop {
        if pos >= len {
            if scan.tables.is_empty() {
                return Err(format!(
                    "unexpected end of data at offset {pos} before any quantization table"
                ));
            }
            break;
        }
        if bytes[pos] != 0xFF {
            return Err(format!(
                "expected marker at offset {pos}, found 0x{:02X}",
                bytes[pos]
            ));
        }
        while pos < len && bytes[pos] == 0xFF {
            pos += 1;
        }
        if pos >= len {
            return Err(format!("truncated marker at offset {pos}"));
        }
        let marker = bytes[pos];
        pos += 1;

        match marker {
            EOI => break,
            TEM | 0xD0..=0xD7 => continue,
            SOI => return Err(format!("unexpected SOI marker at offset {}", pos - 2)),
            0x00 => return Err(format!("invalid marker 0xFF00 at offset {}", pos - 2)),
            _ => {}
        }

        if pos + 2 > len {
            return Err(format!("truncated length of marker 0x{marker:02X} at offset {pos}"));
        }
        let seg_len = usize::from(u16::from_be_bytes([bytes[pos], bytes[pos + 1]]));
        if seg_len < 2 {
            return Err(format!(
                "invalid length {seg_len} for marker 0x{marker:02X} at offset {pos}"
            ));
        }
        let end = pos + seg_len;
        if end > len {
            return Err(format!(
                "segment 0x{marker:02X} at offset {pos} declares {seg_len} bytes but only {} remain",
                len - pos
            ));
        }
        let payload = &bytes[pos + 2..end];

        match marker {
            DQT => parse_dqt(payload, &mut scan.tables)?,
            SOF2 => scan.progressive = true,
            _ => {}
        }
        pos = end;

        if marker == SOS {
            pos = skip_entropy_coded(bytes, pos);
        }
    }

    if scan.tables.is_empty() {
        return Err("no quantization table (DQT) found".to_string());
    }
    Ok(scan)
}

/// Returns the offset of the next real marker after entropy-coded data, or
/// `bytes.len()` if the data runs to the end.
fn skip_entropy_coded(bytes: &[u8], mut pos: usize) -> usize {
    while pos + 1 < bytes.len() {
        if bytes[pos] == 0xFF {
            let next = bytes[pos + 1];
            if next == 0x00 || (0xD0..=0xD7).contains(&next) {
                pos += 2;
                continue;
            }
            return pos;
        }
        pos += 1;
    }
    bytes.len()
}

fn parse_dqt(payload: &[u8], tables: &mut Vec<QuantTable>) -> Result<(), String> {
    let mut i = 0;
    while i < payload.len() {
        let precision = payload[i] >> 4;
        let id = payload[i] & 0x0F;
        i += 1;
        if precision > 1 {
            return Err(format!("invalid DQT precision {precision} for table {id}"));
        }
        if id > 3 {
            return Err(format!("invalid DQT table id {id}"));
        }
        let width = if precision == 0 { 1 } else { 2 };
        if i + 64 * width > payload.len() {
            return Err(format!("DQT table {id} is truncated"));
        }

        let mut values = [0u16; 64];
        for (k, &natural) in ZIGZAG.iter().enumerate() {
            let v = if precision == 0 {
                u16::from(payload[i + k])
            } else {
                u16::from_be_bytes([payload[i + 2 * k], payload[i + 2 * k + 1]])
            };
            if v == 0 {
                return Err(format!("DQT table {id} contains a zero quantizer"));
            }
            values[natural] = v;
        }
        i += 64 * width;

        // a later definition of the same slot replaces the earlier one
        tables.retain(|t| t.id != id);
        tables.push(QuantTable {
            id,
            precision,
            values,
        });
    }
    Ok(())
}

fn estimate_quality(tables: &[QuantTable]) -> u8 {
    if tables.iter().all(|t| t.values.iter().all(|&v| v == 1)) {
        return 100;
    }

    // Coefficients pinned at the encoder's clamp bounds carry no scale
    // information; fall back to all of them only when nothing else is left.
    let mut sum = 0.0f64;
    let mut count = 0usize;
    let mut sum_all = 0.0f64;
    let mut count_all = 0usize;
    for t in tables {
        let reference = if t.id == 0 { &STD_LUMA } else { &STD_CHROMA };
        let ceiling = if t.precision == 0 { 255 } else { u16::MAX };
        for (&q, &r) in t.values.iter().zip(reference.iter()) {
            let s = 100.0 * f64::from(q) / f64::from(r);
            sum_all += s;
            count_all += 1;
            if q == 1 || q == ceiling {
                continue;
            }
            sum += s;
            count += 1;
        }
    }
    let scale = if count > 0 {
        sum / count as f64
    } else {
        sum_all / count_all.max(1) as f64
    };

    let quality = if scale <= 100.0 {
        (200.0 - scale) / 2.0
    } else {
        5000.0 / scale
    };
    quality.round().clamp(1.0, 100.0) as u8
}
