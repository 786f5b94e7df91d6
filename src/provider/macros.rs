use super::{Provider, ProviderInfo};
use crate::Result;

/// One entry in [`PROVIDER_REGISTRY`]: what to show in `providers()` and
/// how to open the provider from a URI with one of `schemes`.
#[doc(hidden)]
pub struct ProviderRegistration {
    pub info: ProviderInfo,
    pub schemes: &'static [&'static str],
    pub factory: fn(&url::Url) -> Result<Box<dyn Provider>>,
}

/// Every provider compiled into the crate.
#[doc(hidden)]
#[linkme::distributed_slice]
pub static PROVIDER_REGISTRY: [ProviderRegistration];

/// Adds a provider to [`PROVIDER_REGISTRY`].
///
/// The factory parses the URI into `config` with `TryFrom<&Url>` and passes
/// it to the fallible `new(config)` of `struct`. Either step can reject the
/// URI, and the error reaches the caller of `Box::<dyn Provider>::try_from`.
macro_rules! register_provider {
    (
        struct: $struct_name:ty,
        config: $config_type:ty,
        name: $name:expr,
        description: $description:expr,
        schemes: [$($scheme:expr),* $(,)?],
        examples: [$($example:expr),* $(,)?] $(,)?
    ) => {
        const _: () = {
            fn open(url: &::url::Url) -> $crate::Result<Box<dyn $crate::provider::Provider>> {
                ::tracing::debug!(provider = $name, scheme = url.scheme(), "opening provider");
                let config = <$config_type>::try_from(url)?;
                Ok(Box::new(<$struct_name>::new(config)?))
            }

            #[linkme::distributed_slice($crate::provider::PROVIDER_REGISTRY)]
            static REGISTRATION: $crate::provider::ProviderRegistration =
                $crate::provider::ProviderRegistration {
                    info: $crate::provider::ProviderInfo {
                        name: $name,
                        description: $description,
                        examples: &[$($example,)*],
                    },
                    schemes: &[$($scheme,)*],
                    factory: open,
                };
        };
    };
}

pub(crate) use register_provider;
