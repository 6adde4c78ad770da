//! Uevent handler collaborators.
//!
//! Each handler declares the fields it needs by checking the table and
//! silently no-ops when they are absent or fail its validation: a
//! non-matching driver name, an out-of-range value, a VID from the wrong
//! vendor. Handlers are independent; the router invokes all of them for
//! every datagram.

use super::parser::{FieldKey, FieldTable};
use super::router::{HandlerCx, UeventHandler};
use crate::collect::{hardware_failed, FailureCode, HardwareType};
use crate::source::read_int;
use ks_common::{Error, EventId, Result, TelemetryEvent, TelemetryValue};
use tracing::{info, warn};

// Type-C PD VID/PID filters.
const VID_MASK: u32 = 0xffff;
const VID_GOOGLE: u32 = 0x18d1;
const PRODUCT_TYPE_OFFSET: u32 = 23;
const PRODUCT_TYPE_MASK: u32 = 7;
const PRODUCT_TYPE_CHARGER: u32 = 3;
const PID_OFFSET: usize = 2;
const PID_LENGTH: usize = 4;
const PID_P30: u32 = 0x4f05;

/// Maximum sensor name accepted by the thermal abnormality report.
const THERMAL_NAME_LENGTH: usize = 20;

/// Microphone break/degrade status reports.
///
/// Requires the datagram devpath to match the configured audio device and
/// one of the mic status fields. The status is either the literal `true`
/// (mic 0) or a 3-bit bitmask naming the affected mics.
pub struct MicStatusHandler {
    audio_devpath: String,
}

impl MicStatusHandler {
    pub fn new(audio_devpath: impl Into<String>) -> Self {
        Self {
            audio_devpath: audio_devpath.into(),
        }
    }

    fn report(&self, status: &str, broken: bool, cx: &HandlerCx<'_>) -> Result<()> {
        if status == "true" {
            return cx.sink.submit(&hardware_failed(
                HardwareType::Microphone,
                0,
                if broken {
                    FailureCode::Complete
                } else {
                    FailureCode::Degrade
                },
            ));
        }

        let mask: u32 = status
            .parse()
            .map_err(|_| Error::malformed("uevent", format!("invalid mic status {status:?}")))?;
        match mask {
            0 => Ok(()), // mic is ok
            1..=7 => {
                for bit in 0..3 {
                    if mask & (1 << bit) != 0 {
                        cx.sink.submit(&hardware_failed(
                            HardwareType::Microphone,
                            bit,
                            if broken {
                                FailureCode::Complete
                            } else {
                                FailureCode::Degrade
                            },
                        ))?;
                    }
                }
                Ok(())
            }
            _ => Err(Error::malformed(
                "uevent",
                format!("mic status bitmask out of range: {mask}"),
            )),
        }
    }
}

impl UeventHandler for MicStatusHandler {
    fn name(&self) -> &'static str {
        "mic_status"
    }

    fn handle(&mut self, fields: &FieldTable, cx: &HandlerCx<'_>) -> Result<()> {
        match fields.get(FieldKey::DevPath) {
            Some(devpath) if devpath == self.audio_devpath => {}
            _ => return Ok(()),
        }

        if let Some(status) = fields.get(FieldKey::MicBreakStatus) {
            self.report(status, true, cx)?;
        }
        if let Some(status) = fields.get(FieldKey::MicDegradeStatus) {
            self.report(status, false, cx)?;
        }
        Ok(())
    }
}

/// USB port overheat mitigation reports.
///
/// Fires on the overheat mitigation driver's uevent and pulls the episode
/// detail from five sysfs attributes under the configured directory.
pub struct UsbOverheatHandler {
    overheat_dir: String,
}

impl UsbOverheatHandler {
    pub fn new(overheat_dir: impl Into<String>) -> Self {
        Self {
            overheat_dir: overheat_dir.into(),
        }
    }
}

impl UeventHandler for UsbOverheatHandler {
    fn name(&self) -> &'static str {
        "usb_overheat"
    }

    fn handle(&mut self, fields: &FieldTable, cx: &HandlerCx<'_>) -> Result<()> {
        match fields.get(FieldKey::Driver) {
            Some("google,overheat_mitigation") => {}
            _ => return Ok(()),
        }

        let attr = |name: &str| -> Result<i64> {
            read_int(cx.source, &format!("{}/{}", self.overheat_dir, name))
        };
        let plug_temp = attr("plug_temp")?;
        let max_temp = attr("max_temp")?;
        let trip_time = attr("trip_time")?;
        let hysteresis_time = attr("hysteresis_time")?;
        let cleared_time = attr("cleared_time")?;

        cx.sink.submit(&TelemetryEvent::new(
            EventId::UsbPortOverheat,
            vec![
                TelemetryValue::Int(plug_temp as i32),
                TelemetryValue::Int(max_temp as i32),
                TelemetryValue::Int(trip_time as i32),
                TelemetryValue::Int(hysteresis_time as i32),
                TelemetryValue::Int(cleared_time as i32),
            ],
        ))
    }
}

/// Type-C power delivery partner VID/PID reports.
///
/// Triggered by the partner power-supply announcement. Only first-party
/// vendor IDs are reported, and only for chargers (or the one known PID
/// whose product type is not set to charger).
pub struct TypeCPartnerHandler {
    vid_path: String,
    pid_path: String,
}

impl TypeCPartnerHandler {
    pub fn new(vid_path: impl Into<String>, pid_path: impl Into<String>) -> Self {
        Self {
            vid_path: vid_path.into(),
            pid_path: pid_path.into(),
        }
    }
}

impl UeventHandler for TypeCPartnerHandler {
    fn name(&self) -> &'static str {
        "typec_partner"
    }

    fn handle(&mut self, fields: &FieldTable, cx: &HandlerCx<'_>) -> Result<()> {
        if !fields.contains(FieldKey::TypeCPartner) {
            return Ok(());
        }

        let vid_text = cx.source.read_text(&self.vid_path)?;
        let vid = u32::from_str_radix(vid_text.trim(), 16)
            .map_err(|_| Error::malformed(&self.vid_path, "expected hex vid"))?;

        let pid_text = cx.source.read_text(&self.pid_path)?;
        let pid_text = pid_text.trim();
        let pid_slice = pid_text
            .get(PID_OFFSET..PID_OFFSET + PID_LENGTH)
            .ok_or_else(|| Error::malformed(&self.pid_path, "pid field too short"))?;
        let pid = u32::from_str_radix(pid_slice, 16)
            .map_err(|_| Error::malformed(&self.pid_path, "expected hex pid"))?;

        // Report only first-party vendor IDs.
        if vid & VID_MASK != VID_GOOGLE {
            return Ok(());
        }
        // Report only chargers, plus the one PID exempt from the
        // product-type encoding.
        if (vid >> PRODUCT_TYPE_OFFSET) & PRODUCT_TYPE_MASK != PRODUCT_TYPE_CHARGER && pid != PID_P30
        {
            return Ok(());
        }

        cx.sink.submit(&TelemetryEvent::new(
            EventId::PdVidPid,
            vec![
                TelemetryValue::Int((vid & VID_MASK) as i32),
                TelemetryValue::Int(pid as i32),
            ],
        ))
    }
}

/// GPU driver abnormality events.
pub struct GpuEventHandler;

impl GpuEventHandler {
    fn event_type(value: &str) -> Option<i32> {
        match value {
            "KMD_ERROR" => Some(1),
            "GPU_RESET" => Some(2),
            _ => None,
        }
    }

    fn event_info(value: &str) -> Option<i32> {
        match value {
            "CSG_REQ_STATUS_UPDATE" => Some(1),
            "CSG_SUSPEND_TIMEOUT" => Some(2),
            "GPU_PAGE_FAULT" => Some(3),
            "FIRMWARE_PING_TIMEOUT" => Some(4),
            _ => None,
        }
    }
}

impl UeventHandler for GpuEventHandler {
    fn name(&self) -> &'static str {
        "gpu_event"
    }

    fn handle(&mut self, fields: &FieldTable, cx: &HandlerCx<'_>) -> Result<()> {
        match fields.get(FieldKey::Driver) {
            Some(driver) if driver.starts_with("mali") => {}
            _ => return Ok(()),
        }
        let (Some(type_str), Some(info_str)) = (
            fields.get(FieldKey::GpuEventType),
            fields.get(FieldKey::GpuEventInfo),
        ) else {
            return Ok(());
        };
        let (Some(event_type), Some(event_info)) =
            (Self::event_type(type_str), Self::event_info(info_str))
        else {
            return Ok(());
        };

        cx.sink.submit(&TelemetryEvent::new(
            EventId::GpuEvent,
            vec![
                TelemetryValue::Int(event_type),
                TelemetryValue::Int(event_info),
            ],
        ))
    }
}

/// Thermal sensor abnormality events.
///
/// Payload arrives as two fields: a type token and an info record of the
/// form `name:{sensor},val:{reading}`.
pub struct ThermalAbnormalHandler;

impl ThermalAbnormalHandler {
    fn abnormality_type(value: &str) -> Option<i32> {
        match value {
            "SENSOR_STUCK" => Some(1),
            "EXTREME_HIGH_TEMP" => Some(2),
            "EXTREME_LOW_TEMP" => Some(3),
            _ => None,
        }
    }
}

impl UeventHandler for ThermalAbnormalHandler {
    fn name(&self) -> &'static str {
        "thermal_abnormal"
    }

    fn handle(&mut self, fields: &FieldTable, cx: &HandlerCx<'_>) -> Result<()> {
        match fields.get(FieldKey::DevPath) {
            Some(devpath) if devpath.starts_with("/module/pixel_metrics") => {}
            _ => return Ok(()),
        }
        let (Some(type_str), Some(info_str)) = (
            fields.get(FieldKey::ThermalAbnormalType),
            fields.get(FieldKey::ThermalAbnormalInfo),
        ) else {
            return Ok(());
        };

        let Some(abnormality) = Self::abnormality_type(type_str) else {
            warn!(
                target: "ks_core::uevent",
                value = type_str,
                "unknown thermal abnormality type"
            );
            return Ok(());
        };

        let (name_part, val_part) = info_str.split_once(',').ok_or_else(|| {
            Error::malformed("uevent", format!("thermal info missing separator: {info_str:?}"))
        })?;
        let name = name_part.strip_prefix("name:").ok_or_else(|| {
            Error::malformed("uevent", format!("thermal info name prefix: {name_part:?}"))
        })?;
        let val_str = val_part.strip_prefix("val:").ok_or_else(|| {
            Error::malformed("uevent", format!("thermal info val prefix: {val_part:?}"))
        })?;
        if name.len() > THERMAL_NAME_LENGTH {
            return Err(Error::malformed(
                "uevent",
                format!("thermal sensor name too long: {name:?}"),
            ));
        }
        let val: i32 = val_str.trim().parse().map_err(|_| {
            Error::malformed("uevent", format!("thermal reading not an integer: {val_str:?}"))
        })?;

        info!(
            target: "ks_core::uevent",
            abnormality,
            sensor = name,
            val,
            "thermal abnormality detected"
        );
        cx.sink.submit(&TelemetryEvent::new(
            EventId::ThermalAbnormality,
            vec![
                TelemetryValue::Int(abnormality),
                TelemetryValue::Text(name.to_string()),
                TelemetryValue::Int(val),
            ],
        ))
    }
}
