mod headers;

// Export utility functions
pub use self::headers::parse_headers;
