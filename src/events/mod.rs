pub mod button;

pub use button::{button_label, ButtonEvent, DeviceClass};
