//! Wire protocol selection and per-dialect capability table
//!
//! The same logical operation can be expressed in one of three incompatible
//! wire protocols. The two OData dialects differ in field naming and in which
//! query options they allow together; CSOM is the stateful action/object-path
//! protocol and has no OData query surface at all.

use serde::{Deserialize, Serialize};

/// Target wire protocol for a logical operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Protocol {
    /// Legacy SharePoint REST dialect (`{site}/_api/...`).
    Rest,
    /// Microsoft Graph dialect (`https://graph.microsoft.com/v1.0/...`).
    Graph,
    /// Stateful CSOM protocol (`{site}/_vti_bin/client.svc/ProcessQuery`).
    Csom,
}

impl Protocol {
    pub fn label(self) -> &'static str {
        match self {
            Self::Rest => "REST",
            Self::Graph => "Graph",
            Self::Csom => "CSOM",
        }
    }

    /// Whether `$top`/`$skip` may be combined with `$filter`.
    /// The legacy REST dialect forbids the combination; Graph allows it.
    pub fn supports_top_with_filter(self) -> bool {
        matches!(self, Self::Graph)
    }

    /// Whether structural spaces in rendered query options are percent-encoded.
    pub fn encodes_query_spaces(self) -> bool {
        matches!(self, Self::Rest)
    }

    /// Whether the protocol is one of the two OData dialects.
    pub fn is_odata(self) -> bool {
        !matches!(self, Self::Csom)
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_with_filter_capability() {
        assert!(!Protocol::Rest.supports_top_with_filter());
        assert!(Protocol::Graph.supports_top_with_filter());
        assert!(!Protocol::Csom.supports_top_with_filter());
    }

    #[test]
    fn test_space_encoding() {
        assert!(Protocol::Rest.encodes_query_spaces());
        assert!(!Protocol::Graph.encodes_query_spaces());
    }
}
