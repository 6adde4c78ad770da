//! Kernel uevent pipeline: parse, route, contain.
//!
//! - `parser`: NUL-delimited datagram → field table
//! - `router`: field table → independent handler collaborators
//! - `handlers`: the shipped handler set
//! - `listener`: blocking receive loop with a consecutive-error breaker
//! - `netlink`: the Linux `NETLINK_KOBJECT_UEVENT` socket

pub mod handlers;
pub mod listener;
#[cfg(target_os = "linux")]
pub mod netlink;
pub mod parser;
pub mod router;

pub use handlers::{
    GpuEventHandler, MicStatusHandler, ThermalAbnormalHandler, TypeCPartnerHandler,
    UsbOverheatHandler,
};
pub use listener::{
    BreakerState, CircuitBreaker, DatagramSource, Listener, MAX_CONSECUTIVE_ERRORS,
};
#[cfg(target_os = "linux")]
pub use netlink::NetlinkUeventSocket;
pub use parser::{
    FieldKey, FieldTable, UeventParser, DEFAULT_TYPEC_PARTNER_PREFIX, UEVENT_MSG_LEN,
};
pub use router::{HandlerCx, Router, UeventHandler};

use crate::config::UeventConfig;

/// Assemble the handler set for the configured hardware. Handlers whose
/// paths are absent are left out entirely rather than shipped as no-ops.
pub fn build_handlers(config: &UeventConfig) -> Vec<Box<dyn UeventHandler>> {
    let mut handlers: Vec<Box<dyn UeventHandler>> = Vec::new();
    if let Some(devpath) = &config.audio_devpath {
        handlers.push(Box::new(MicStatusHandler::new(devpath.clone())));
    }
    if let Some(dir) = &config.usb_overheat_dir {
        handlers.push(Box::new(UsbOverheatHandler::new(dir.clone())));
    }
    if let (Some(vid), Some(pid)) = (&config.typec_vid_path, &config.typec_pid_path) {
        handlers.push(Box::new(TypeCPartnerHandler::new(vid.clone(), pid.clone())));
    }
    handlers.push(Box::new(GpuEventHandler));
    handlers.push(Box::new(ThermalAbnormalHandler));
    handlers
}
