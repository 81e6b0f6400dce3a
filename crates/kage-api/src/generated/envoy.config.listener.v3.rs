// [#protodoc-title: Listener configuration]

/// A network filter in the filter chain.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Filter {
    /// The name of the filter configuration.
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    #[prost(oneof = "filter::ConfigType", tags = "4")]
    pub config_type: ::core::option::Option<filter::ConfigType>,
}
/// Nested message and enum types in `Filter`.
pub mod filter {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum ConfigType {
        /// Filter specific configuration which depends on the filter being
        /// instantiated. Most filters support this type of configuration.
        #[prost(message, tag = "4")]
        TypedConfig(::prost_types::Any),
    }
}
/// A filter chain wraps a set of match criteria, a TLS context, a set of
/// filters, and various other parameters.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FilterChain {
    /// A list of individual network filters that make up the filter chain for
    /// connections established with the listener. Order matters as the filters
    /// are processed sequentially as connection events happen.
    #[prost(message, repeated, tag = "3")]
    pub filters: ::prost::alloc::vec::Vec<Filter>,
    /// The unique name (or empty) by which this filter chain is known.
    #[prost(string, tag = "7")]
    pub name: ::prost::alloc::string::String,
}
/// A listener wraps an address and port, and a set of filter chains.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Listener {
    /// The unique name by which this listener is known. If no name is provided,
    /// Envoy will allocate an internal UUID for the listener.
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    /// The address that the listener should listen on. In general, the address
    /// must be unique, though that is governed by the bind rules of the OS.
    #[prost(message, optional, tag = "2")]
    pub address: ::core::option::Option<super::super::core::v3::Address>,
    /// A list of filter chains to consider for this listener. The
    /// FilterChain with the most specific FilterChainMatch criteria is used on
    /// a connection.
    #[prost(message, repeated, tag = "3")]
    pub filter_chains: ::prost::alloc::vec::Vec<FilterChain>,
    /// The type of traffic (e.g. sidecar) for which this listener is meant to
    /// be used.
    #[prost(enumeration = "super::super::core::v3::TrafficDirection", tag = "16")]
    pub traffic_direction: i32,
}
