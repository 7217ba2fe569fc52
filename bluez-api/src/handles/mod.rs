//! Pass-through handles for the four resolvable interfaces
//!
//! BlueZ docs: https://git.kernel.org/pub/scm/bluetooth/bluez.git/tree/doc

mod adapter;
mod device;
mod media_player;
mod media_transport;

pub use adapter::Adapter;
pub use device::Device;
pub use media_player::MediaPlayer;
pub use media_transport::MediaTransport;
