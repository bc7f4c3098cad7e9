/// Public storefront content: profiles, custom links and banners

pub mod banners;
pub mod links;
pub mod profiles;

pub use banners::{BannerManager, NewBanner, MAX_ACTIVE_BANNERS};
pub use links::{LinkManager, NewLink, MAX_ACTIVE_LINKS};
pub use profiles::{ProfileInput, ProfileManager};
