pub mod leads;
pub mod routing;
pub mod subdomain;
