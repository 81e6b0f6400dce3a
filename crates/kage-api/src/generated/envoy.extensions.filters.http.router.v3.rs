// [#protodoc-title: Router]

/// The terminal HTTP filter that performs routing. The router filter must
/// always be configured as the last filter in the HTTP filter chain.
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct Router {}
