//! Declarative macro for interface handle definitions
//!
//! Handles are 1:1 pass-throughs: each method is one call, each property one
//! Get (and for writable properties one Set). The macro generates the struct,
//! its constructor and every accessor from a name table.

/// Define a handle type wrapping one BlueZ interface
///
/// # Example
/// ```rust,ignore
/// define_interface_handle! {
///     /// Media player
///     handle: MediaPlayer,
///     interface: MediaPlayer,
///     methods: { play: "Play", pause: "Pause" },
///     read_only: { status: "Status" },
///     read_write: { repeat: "Repeat" },
/// }
/// ```
///
/// expands to a `MediaPlayer` struct with `play()`, `pause()`, `status()`,
/// `repeat()` and `set_repeat(value)`.
macro_rules! define_interface_handle {
    (
        $(#[$meta:meta])*
        handle: $handle:ident,
        interface: $iface:ident,
        methods: {
            $($method:ident: $method_name:literal),* $(,)?
        },
        read_only: {
            $($ro:ident: $ro_name:literal),* $(,)?
        },
        read_write: {
            $($rw:ident: $rw_name:literal),* $(,)?
        } $(,)?
    ) => {
        paste::paste! {
            $(#[$meta])*
            #[derive(Debug, Clone)]
            pub struct $handle {
                proxy: $crate::proxy::Proxy,
            }

            impl $handle {
                /// Interface this handle wraps
                pub const INTERFACE: $crate::interface::Interface =
                    $crate::interface::Interface::$iface;

                pub fn new(
                    bus: std::sync::Arc<dyn $crate::bus::BusClient>,
                    path: $crate::path::ObjectPath,
                ) -> Self {
                    Self {
                        proxy: $crate::proxy::Proxy::new(bus, path, Self::INTERFACE.name()),
                    }
                }

                pub fn path(&self) -> &$crate::path::ObjectPath {
                    self.proxy.path()
                }

                pub fn proxy(&self) -> &$crate::proxy::Proxy {
                    &self.proxy
                }

                /// All properties of the interface in one GetAll round trip
                pub async fn properties(&self) -> $crate::error::Result<$crate::path::PropertyMap> {
                    self.proxy.properties().await
                }

                pub async fn get_property(&self, name: &str) -> $crate::error::Result<serde_json::Value> {
                    self.proxy.get_property(name).await
                }

                pub async fn set_property(
                    &self,
                    name: &str,
                    value: serde_json::Value,
                ) -> $crate::error::Result<()> {
                    self.proxy.set_property(name, value).await
                }

                $(
                    #[doc = concat!("Calls `", $method_name, "`")]
                    pub async fn $method(&self) -> $crate::error::Result<()> {
                        self.proxy.call($method_name, Vec::new()).await.map(|_| ())
                    }
                )*

                $(
                    #[doc = concat!("Reads the `", $ro_name, "` property")]
                    pub async fn $ro(&self) -> $crate::error::Result<serde_json::Value> {
                        self.proxy.get_property($ro_name).await
                    }
                )*

                $(
                    #[doc = concat!("Reads the `", $rw_name, "` property")]
                    pub async fn $rw(&self) -> $crate::error::Result<serde_json::Value> {
                        self.proxy.get_property($rw_name).await
                    }

                    #[doc = concat!("Writes the `", $rw_name, "` property")]
                    pub async fn [<set_ $rw>](
                        &self,
                        value: serde_json::Value,
                    ) -> $crate::error::Result<()> {
                        self.proxy.set_property($rw_name, value).await
                    }
                )*
            }
        }
    };
}

pub(crate) use define_interface_handle;
