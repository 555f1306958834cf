//! Static well-known-port table.
//!
//! Process-lifetime read-only map used to label port statistics; never
//! mutated at runtime.

use std::collections::HashMap;

use once_cell::sync::Lazy;

static WELL_KNOWN_PORTS: Lazy<HashMap<u16, &'static str>> = Lazy::new(|| {
    HashMap::from([
        (20, "FTP-DATA"),
        (21, "FTP"),
        (22, "SSH"),
        (23, "Telnet"),
        (25, "SMTP"),
        (53, "DNS"),
        (67, "DHCP"),
        (68, "DHCP"),
        (69, "TFTP"),
        (80, "HTTP"),
        (110, "POP3"),
        (123, "NTP"),
        (137, "NetBIOS-NS"),
        (138, "NetBIOS-DGM"),
        (139, "NetBIOS-SSN"),
        (143, "IMAP"),
        (161, "SNMP"),
        (389, "LDAP"),
        (443, "HTTPS"),
        (445, "SMB"),
        (465, "SMTPS"),
        (514, "Syslog"),
        (587, "Submission"),
        (636, "LDAPS"),
        (853, "DoT"),
        (993, "IMAPS"),
        (995, "POP3S"),
        (1433, "MSSQL"),
        (1883, "MQTT"),
        (2323, "Telnet-Alt"),
        (3306, "MySQL"),
        (3389, "RDP"),
        (5060, "SIP"),
        (5061, "SIPS"),
        (5432, "PostgreSQL"),
        (5683, "CoAP"),
        (6379, "Redis"),
        (8080, "HTTP-Alt"),
        (8443, "HTTPS-Alt"),
        (8883, "MQTT-TLS"),
        (9200, "Elasticsearch"),
        (27017, "MongoDB"),
    ])
});

/// Service name for a well-known port, if tabled.
pub fn service_name(port: u16) -> Option<&'static str> {
    WELL_KNOWN_PORTS.get(&port).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_ports_labeled() {
        assert_eq!(service_name(443), Some("HTTPS"));
        assert_eq!(service_name(53), Some("DNS"));
        assert_eq!(service_name(1883), Some("MQTT"));
    }

    #[test]
    fn test_ephemeral_port_unlabeled() {
        assert_eq!(service_name(49152), None);
    }
}
