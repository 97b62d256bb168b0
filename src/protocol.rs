use crate::types::{ImuSample, Pose3DoF, Profile};

// -- USB identifiers --
pub const VID: u16 = 0x1BBB;
pub const PID: u16 = 0xAF50;
pub const USB_CLASS_HID: u8 = 0x03;

// -- Packet geometry --
pub const FRAME_SIZE: usize = 64;

// -- Raw IMU report header --
pub const SYNC_BYTE: u8 = 0x99;
pub const PACKET_IMU_DATA: u8 = 0x65;

// -- Enable command --
pub const CMD_PREFIX: u8 = 0x66;
pub const CMD_IMU_ON: u8 = 0x01;

// -- HID class control transfers --
pub const REQUEST_TYPE_CLASS_OUT: u8 = 0x21;
pub const REQUEST_TYPE_CLASS_IN: u8 = 0xA1;
pub const HID_GET_REPORT: u8 = 0x01;
pub const HID_SET_REPORT: u8 = 0x09;
pub const HID_SET_IDLE: u8 = 0x0A;
/// Output report, id 0.
pub const SET_REPORT_VALUE: u16 = 0x02 << 8;
/// Input report, id 0.
pub const GET_REPORT_VALUE: u16 = 0x0100;

const DEG_TO_RAD: f32 = std::f32::consts::PI / 180.0;

/// Why a buffer did not decode into a sample. Routine; callers read again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("packet too short: {len} bytes (need {need})")]
    TooShort { len: usize, need: usize },

    #[error("bad sync byte 0x{0:02x}")]
    BadSync(u8),

    #[error("unexpected packet type 0x{0:02x}")]
    BadType(u8),
}

/// Byte layout of the firmware pose report.
///
/// These offsets are provisional: they have never been checked against a
/// capture, and the report carries no header to validate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseLayout {
    pub min_packet_size: usize,
    pub yaw_offset: usize,
    pub pitch_offset: usize,
    pub roll_offset: usize,
    /// Raw int16 counts per degree.
    pub scale: f32,
}

impl Default for PoseLayout {
    fn default() -> Self {
        Self {
            min_packet_size: 8,
            yaw_offset: 0,
            pitch_offset: 2,
            roll_offset: 4,
            scale: 100.0,
        }
    }
}

/// Build the 64-byte "IMU on" frame: [0x66, 0x01, 0x00, 0...].
pub fn build_enable_command() -> [u8; FRAME_SIZE] {
    let mut buf = [0u8; FRAME_SIZE];
    buf[0] = CMD_PREFIX;
    buf[1] = CMD_IMU_ON;
    buf
}

fn read_f32(data: &[u8], offset: usize) -> f32 {
    f32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

/// Parse a raw 64-byte IMU report.
///
/// Packet layout (little-endian):
/// - `[0]`: 0x99 sync
/// - `[1]`: 0x65 IMU data ack
/// - `[4..16]`: accel x, y, z (f32)
/// - `[16..28]`: gyro x, y, z in deg/s (f32)
/// - `[28]`: temperature (f32)
/// - `[32..40]`: magnetometer x, y (f32)
/// - `[40]`: tick (u32)
/// - `[44]`: proximity (f32)
/// - `[48]`: light (f32)
/// - `[52]`: magnetometer z (f32)
pub fn decode_imu(data: &[u8]) -> Result<ImuSample, Rejection> {
    if data.len() < FRAME_SIZE {
        return Err(Rejection::TooShort {
            len: data.len(),
            need: FRAME_SIZE,
        });
    }
    if data[0] != SYNC_BYTE {
        return Err(Rejection::BadSync(data[0]));
    }
    if data[1] != PACKET_IMU_DATA {
        return Err(Rejection::BadType(data[1]));
    }

    let accel = [read_f32(data, 4), read_f32(data, 8), read_f32(data, 12)];
    let gyro_dps = [read_f32(data, 16), read_f32(data, 20), read_f32(data, 24)];
    let temperature = read_f32(data, 28);
    let magnet = [read_f32(data, 32), read_f32(data, 36), read_f32(data, 52)];
    let tick = u32::from_le_bytes([data[40], data[41], data[42], data[43]]);
    let psensor = read_f32(data, 44);
    let lsensor = read_f32(data, 48);

    Ok(ImuSample {
        accel,
        gyro_dps,
        gyro_rad: gyro_dps.map(|d| d * DEG_TO_RAD),
        magnet,
        temperature,
        tick,
        psensor,
        lsensor,
        valid: true,
    })
}

fn read_i16(data: &[u8], offset: usize) -> i16 {
    if offset + 2 > data.len() {
        return 0;
    }
    i16::from_le_bytes([data[offset], data[offset + 1]])
}

/// Parse a firmware pose report. Only the length is checked.
pub fn decode_pose(data: &[u8], layout: &PoseLayout) -> Result<Pose3DoF, Rejection> {
    if data.len() < layout.min_packet_size {
        return Err(Rejection::TooShort {
            len: data.len(),
            need: layout.min_packet_size,
        });
    }
    Ok(Pose3DoF {
        yaw_deg: read_i16(data, layout.yaw_offset) as f32 / layout.scale,
        pitch_deg: read_i16(data, layout.pitch_offset) as f32 / layout.scale,
        roll_deg: read_i16(data, layout.roll_offset) as f32 / layout.scale,
    })
}

/// Output of [`PacketDecoder::decode`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decoded {
    Imu(ImuSample),
    Pose(Pose3DoF),
}

/// Profile-aware decoder that counts packets and hex-dumps a few for debugging.
#[derive(Debug)]
pub struct PacketDecoder {
    profile: Profile,
    layout: PoseLayout,
    packet_count: u64,
}

impl PacketDecoder {
    pub fn new(profile: Profile, layout: PoseLayout) -> Self {
        Self {
            profile,
            layout,
            packet_count: 0,
        }
    }

    /// Number of buffers passed to `decode` so far.
    pub fn packet_count(&self) -> u64 {
        self.packet_count
    }

    pub fn decode(&mut self, data: &[u8]) -> Result<Decoded, Rejection> {
        self.packet_count += 1;
        if self.packet_count <= 5 || self.packet_count % 100 == 0 {
            log::debug!(
                "Packet #{} ({} bytes): {}",
                self.packet_count,
                data.len(),
                hex_dump(&data[..data.len().min(FRAME_SIZE)])
            );
        }

        match self.profile {
            Profile::RawImu64 => decode_imu(data).map(Decoded::Imu),
            Profile::FirmwarePose16 => decode_pose(data, &self.layout).map(Decoded::Pose),
        }
    }
}

fn hex_dump(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A well-formed IMU report with the given accel, gyro (deg/s) and tick.
    pub(crate) fn imu_frame(accel: [f32; 3], gyro_dps: [f32; 3], tick: u32) -> [u8; FRAME_SIZE] {
        let mut buf = [0u8; FRAME_SIZE];
        buf[0] = SYNC_BYTE;
        buf[1] = PACKET_IMU_DATA;
        for (i, v) in accel.iter().enumerate() {
            buf[4 + i * 4..8 + i * 4].copy_from_slice(&v.to_le_bytes());
        }
        for (i, v) in gyro_dps.iter().enumerate() {
            buf[16 + i * 4..20 + i * 4].copy_from_slice(&v.to_le_bytes());
        }
        buf[40..44].copy_from_slice(&tick.to_le_bytes());
        buf
    }

    #[test]
    fn test_enable_command() {
        let cmd = build_enable_command();
        assert_eq!(cmd.len(), 64);
        assert_eq!(cmd[0], 0x66);
        assert_eq!(cmd[1], 0x01);
        assert!(cmd[2..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_decode_imu_packet() {
        let mut buf = imu_frame([1.0, 2.0, 3.0], [10.0, 20.0, 30.0], 12345);
        buf[28..32].copy_from_slice(&36.5f32.to_le_bytes());
        buf[32..36].copy_from_slice(&0.1f32.to_le_bytes());
        buf[36..40].copy_from_slice(&0.2f32.to_le_bytes());
        buf[44..48].copy_from_slice(&5.0f32.to_le_bytes());
        buf[48..52].copy_from_slice(&100.0f32.to_le_bytes());
        buf[52..56].copy_from_slice(&0.3f32.to_le_bytes());

        let s = decode_imu(&buf).unwrap();
        assert!(s.valid);
        for (got, want) in s.accel.iter().zip([1.0f32, 2.0, 3.0]) {
            assert!((*got - want).abs() < 0.001);
        }
        for (got, want) in s.gyro_dps.iter().zip([10.0f32, 20.0, 30.0]) {
            assert!((*got - want).abs() < 0.001);
        }
        for (rad, dps) in s.gyro_rad.iter().zip(s.gyro_dps.iter()) {
            assert!((*rad - *dps * std::f32::consts::PI / 180.0).abs() < 1e-6);
        }
        for (got, want) in s.magnet.iter().zip([0.1f32, 0.2, 0.3]) {
            assert!((*got - want).abs() < 0.001);
        }
        assert!((s.temperature - 36.5).abs() < 0.001);
        assert!((s.psensor - 5.0).abs() < 0.001);
        assert!((s.lsensor - 100.0).abs() < 0.001);
        assert_eq!(s.tick, 12345);
    }

    #[test]
    fn test_tick_is_unsigned() {
        let buf = imu_frame([0.0; 3], [0.0; 3], 0xFFFF_FFF0);
        assert_eq!(decode_imu(&buf).unwrap().tick, 4_294_967_280);
    }

    #[test]
    fn test_reject_bad_sync_regardless_of_content() {
        for sync in [0x00u8, 0x98, 0x9A, 0xFF] {
            let mut buf = imu_frame([1.0; 3], [1.0; 3], 1);
            buf[0] = sync;
            assert_eq!(decode_imu(&buf), Err(Rejection::BadSync(sync)));
        }
        let mut noise = [0xA5u8; FRAME_SIZE];
        noise[1] = PACKET_IMU_DATA;
        assert!(decode_imu(&noise).is_err());
    }

    #[test]
    fn test_reject_bad_type() {
        let mut buf = imu_frame([1.0; 3], [1.0; 3], 1);
        buf[1] = 0x66;
        assert_eq!(decode_imu(&buf), Err(Rejection::BadType(0x66)));
    }

    #[test]
    fn test_reject_short_buffer() {
        let buf = imu_frame([1.0; 3], [1.0; 3], 1);
        assert_eq!(
            decode_imu(&buf[..63]),
            Err(Rejection::TooShort { len: 63, need: 64 })
        );
    }

    #[test]
    fn test_decode_pose() {
        let mut buf = [0u8; 8];
        buf[0..2].copy_from_slice(&4500i16.to_le_bytes());
        buf[2..4].copy_from_slice(&(-1250i16).to_le_bytes());
        buf[4..6].copy_from_slice(&100i16.to_le_bytes());
        let pose = decode_pose(&buf, &PoseLayout::default()).unwrap();
        assert!((pose.yaw_deg - 45.0).abs() < 1e-4);
        assert!((pose.pitch_deg + 12.5).abs() < 1e-4);
        assert!((pose.roll_deg - 1.0).abs() < 1e-4);
        assert_eq!(pose.to_string(), "45, -13, 1");

        assert!(decode_pose(&buf[..7], &PoseLayout::default()).is_err());
    }

    #[test]
    fn test_pose_offset_past_end_reads_zero() {
        let layout = PoseLayout {
            roll_offset: 7,
            ..PoseLayout::default()
        };
        let buf = [0x10u8; 8];
        let pose = decode_pose(&buf, &layout).unwrap();
        assert_eq!(pose.roll_deg, 0.0);
    }

    #[test]
    fn test_decoder_counts_every_buffer() {
        let mut decoder = PacketDecoder::new(Profile::RawImu64, PoseLayout::default());
        let good = imu_frame([0.0; 3], [1.0; 3], 7);
        assert!(matches!(decoder.decode(&good), Ok(Decoded::Imu(_))));
        assert!(decoder.decode(&[0u8; 64]).is_err());
        assert_eq!(decoder.packet_count(), 2);

        let mut decoder = PacketDecoder::new(Profile::FirmwarePose16, PoseLayout::default());
        assert!(matches!(decoder.decode(&[0u8; 64]), Ok(Decoded::Pose(_))));
    }
}
