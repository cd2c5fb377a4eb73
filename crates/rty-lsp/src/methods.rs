//! The method registry.
//!
//! A static table enumerates every method the server knows, with its
//! notification/request classification and direction. Unknown inbound
//! names synthesize an unsupported client-initiated notification, which
//! the dispatcher ignores.

/// Who may initiate a method.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MethodKind {
    /// Only the editor sends it.
    ClientInitiated,
    /// Only the server sends it.
    ServerInitiated,
    /// Either side may send it.
    Both,
}

/// One entry of the method registry.
#[derive(Clone, Debug)]
pub struct LspMethod {
    /// The canonical method name.
    pub name: String,
    /// Notification (no reply) vs request (reply required).
    pub is_notification: bool,
    /// Direction.
    pub kind: MethodKind,
    /// Whether this server implements the method.
    pub is_supported: bool,
}

struct MethodSpec {
    name: &'static str,
    is_notification: bool,
    kind: MethodKind,
    is_supported: bool,
}

static ALL: &[MethodSpec] = &[
    MethodSpec {
        name: "initialize",
        is_notification: false,
        kind: MethodKind::ClientInitiated,
        is_supported: true,
    },
    MethodSpec {
        name: "initialized",
        is_notification: true,
        kind: MethodKind::ClientInitiated,
        is_supported: true,
    },
    MethodSpec {
        name: "shutdown",
        is_notification: false,
        kind: MethodKind::ClientInitiated,
        is_supported: true,
    },
    MethodSpec {
        name: "exit",
        is_notification: true,
        kind: MethodKind::ClientInitiated,
        is_supported: true,
    },
    MethodSpec {
        name: "textDocument/didChange",
        is_notification: true,
        kind: MethodKind::ClientInitiated,
        is_supported: true,
    },
    MethodSpec {
        name: "workspace/didChangeWatchedFiles",
        is_notification: true,
        kind: MethodKind::ClientInitiated,
        is_supported: true,
    },
    MethodSpec {
        name: "textDocument/documentSymbol",
        is_notification: false,
        kind: MethodKind::ClientInitiated,
        is_supported: true,
    },
    MethodSpec {
        name: "textDocument/publishDiagnostics",
        is_notification: true,
        kind: MethodKind::ServerInitiated,
        is_supported: true,
    },
    MethodSpec {
        name: "readFile",
        is_notification: false,
        kind: MethodKind::ServerInitiated,
        is_supported: true,
    },
    MethodSpec {
        name: "textDocument/hover",
        is_notification: false,
        kind: MethodKind::ClientInitiated,
        is_supported: false,
    },
    MethodSpec {
        name: "textDocument/definition",
        is_notification: false,
        kind: MethodKind::ClientInitiated,
        is_supported: false,
    },
    MethodSpec {
        name: "textDocument/completion",
        is_notification: false,
        kind: MethodKind::ClientInitiated,
        is_supported: false,
    },
];

/// Look up a method by name; unknown names synthesize an unsupported
/// client-initiated notification.
#[must_use]
pub fn get_method(name: &str) -> LspMethod {
    for candidate in ALL {
        if candidate.name == name {
            return LspMethod {
                name: candidate.name.to_owned(),
                is_notification: candidate.is_notification,
                kind: candidate.kind,
                is_supported: candidate.is_supported,
            };
        }
    }
    LspMethod {
        name: name.to_owned(),
        is_notification: true,
        kind: MethodKind::ClientInitiated,
        is_supported: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_methods_resolve_from_the_table() {
        let method = get_method("textDocument/didChange");
        assert!(method.is_notification);
        assert!(method.is_supported);
        assert_eq!(method.kind, MethodKind::ClientInitiated);
    }

    #[test]
    fn unknown_methods_synthesize_unsupported_notifications() {
        let method = get_method("window/showMessage");
        assert!(method.is_notification);
        assert!(!method.is_supported);
        assert_eq!(method.kind, MethodKind::ClientInitiated);
    }

    #[test]
    fn unsupported_requests_stay_requests() {
        let method = get_method("textDocument/hover");
        assert!(!method.is_notification);
        assert!(!method.is_supported);
    }
}
