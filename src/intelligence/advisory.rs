//! Hardening guidance keyed by port

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdvisoryEntry {
    pub port: u16,
    pub guidance: &'static str,
}

// Keyed independently of the risk table: a port may appear in one and not the other.
const ADVISORY_TABLE: &[(u16, &str)] = &[
    (21, "Replace FTP with SFTP; if it must stay, disable anonymous login and chroot users"),
    (22, "Disable password authentication, use keys only, set PermitRootLogin no and rate-limit connections"),
    (23, "Disable telnetd entirely and use SSH"),
    (25, "Restrict relaying to authenticated senders and enforce STARTTLS"),
    (53, "Disable recursion for external clients and restrict zone transfers"),
    (80, "Redirect to HTTPS and keep the web server and application patched"),
    (110, "Switch clients to POP3S (995) and disable plaintext POP3"),
    (111, "Block rpcbind from untrusted networks or stop it if NFS is unused"),
    (135, "Never expose MSRPC beyond the local network"),
    (139, "Disable NetBIOS over TCP/IP unless legacy clients require it"),
    (143, "Switch clients to IMAPS (993) and disable plaintext IMAP"),
    (443, "Enforce TLS 1.2+, enable HSTS and keep certificates current"),
    (445, "Disable SMBv1, require signing and never expose SMB to the internet"),
    (1433, "Bind SQL Server to localhost or a private interface and enforce strong logins"),
    (2049, "Export shares to explicit hosts only and use root_squash"),
    (2375, "Never expose the unencrypted Docker API; use the local socket or TLS on 2376"),
    (3306, "Set bind-address to 127.0.0.1 and remove anonymous and remote root accounts"),
    (3389, "Put RDP behind a VPN or gateway, require NLA and enable account lockout"),
    (5432, "Set listen_addresses to localhost and require scram-sha-256 in pg_hba.conf"),
    (5900, "Tunnel VNC over SSH and set a strong password"),
    (6379, "Bind Redis to 127.0.0.1, enable protected-mode and set requirepass or ACLs"),
    (8080, "Confirm the service is intended to be public; otherwise bind it to localhost"),
    (8443, "Apply the same TLS hardening as 443 and restrict admin consoles by source IP"),
    (9200, "Enable Elasticsearch security features and bind to a private interface"),
    (11211, "Bind memcached to localhost and disable UDP with -U 0"),
    (27017, "Enable MongoDB authorization and bind to localhost or a private interface"),
];

static ADVISORY_CATALOG: Lazy<HashMap<u16, AdvisoryEntry>> = Lazy::new(|| {
    ADVISORY_TABLE
        .iter()
        .map(|&(port, guidance)| (port, AdvisoryEntry { port, guidance }))
        .collect()
});

/// Hardening guidance for a port, if any is known
pub fn lookup_advisory(port: u16) -> Option<&'static AdvisoryEntry> {
    ADVISORY_CATALOG.get(&port)
}
