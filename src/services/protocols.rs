use std::sync::LazyLock;

pub const UNKNOWN_PROTOCOL: &str = "Unknown";

// Inputs shorter than this never match as a truncated form of a registered address.
const MIN_TRUNCATED_LEN: usize = 10;

#[derive(Debug)]
pub struct ProtocolInfo {
    pub name: &'static str,
    pub addresses: &'static [&'static str],
}

pub const PROTOCOLS: &[ProtocolInfo] = &[
    ProtocolInfo {
        name: "Amnis",
        addresses: &[
            "0x111ae3e5bc816a5e63c2da97d0aa3886519e0cd5e4b046659fa35796bd11542a",
            "0x7e783b349d3e89cf5931af376ebeadbfab855b3fa239b7ada8f5a92fbea6b387",
            "0x6f09bf7a232a2159ce8b0af83d641d7bdeda0921f724764e94e4f9b2d7e0d261",
            "0x7893a5d6cd60610f2bad22bb29668e596d14245b682d508a0794ce69613bcaab",
        ],
    },
    ProtocolInfo {
        name: "Thala Liquid Staking",
        addresses: &["0xfaf4e633ae9eb31366c9ca24214231760926576c7b625313b3688b5e900731f6"],
    },
    ProtocolInfo {
        name: "Thala Farm",
        addresses: &[
            "0x6b3720cd988adeaf721ed9d4730da4324d52364871a68eac62b46d21e4d2fa99",
            "0x3c4a58b4a8dffe6d14448072efcdd5a0e0089a22c6837b94f1d7e8bb1552137f",
            "0xb4a8b8462b4423780d6ee256f3a9a3b9ece5d9440d614f7ab2bfa4556aa4f69d",
        ],
    },
    ProtocolInfo {
        name: "Thala Infrastructure",
        addresses: &[
            "0x9c6d58fa009e08dfb2f5928ded14b3a790a94131da89891466b41ba1e61d83e1",
            "0x4dcae85fc5559071906cd5c76b7420fcbb4b0a92f00ab40ffc394aadbbff5ee9",
            "0x93aa044a65a27bd89b163f8b3be3777b160b09a25c336643dcc2878dfd8f2a8d",
            "0x9e7309b2b63130211f5414c5efe2468bb725e884392dfca86b10975df25d78dd",
            "0x007730cd28ee1cdc9e999336cbc430f99e7c44397c0aa77516f6f23a78559bb5", // ThalaSwap v2
            "0x60955b957956d79bc80b096d3e41bad525dd400d8ce957cdeb05719ed1e4fc26", // router
            "0x1bf23f0881f8fa149500ff6b7a047f608967c028a8ad7a2100caa84833ce851d",
            "0xfb6e709add23c710c40e4844d889938f703719f72d2d4439ee682d67f07a15c5",
            "0x48271d39d0b05bd6efca2278f22277d6fcc375504f9839fd73f74ace240861af",
            "0x092e95ed77b5ac815d3fbc2227e76db238339e9ca43ace45031ec2589bea5b8c",
            "0x07fd500c11216f0fe3095d0c4b8aa4d64a4e2e04f83758462f2b127255643615",
            "0x6970b4878c3aea96732be3f31c2dded12d94d9455ff0c76c67d84859dce35136",
        ],
    },
    ProtocolInfo {
        name: "Thala CDP",
        addresses: &["0x6f986d146e4a90b828d8c12c14b6f4e003fdff11a8eecceceb63744363eaac01"],
    },
    ProtocolInfo {
        name: "Echelon",
        addresses: &[
            "0xc6bc659f1649553c1a3fa05d9727433dc03843baac29473c817d06d39e7621ba",
            "0x024c90c44edf46aa02c3e370725b918a59c52b5aa551388feb258bd5a1e82271",
        ],
    },
    ProtocolInfo {
        name: "Echo Lending",
        addresses: &[
            "0xeab7ea4d635b6b6add79d5045c4a45d8148d88287b1cfa1c3b6a4b56f46839ed",
            "0x4e1854f6d332c9525e258fb6e66f84b6af8aba687bbcb832a24768c4e175feec",
        ],
    },
    ProtocolInfo {
        name: "Aave",
        addresses: &[
            "0x34c3e6af238f3a7fa3f3b0088cbc4b194d21f62e65a15b79ae91364de5a81a3a",
            "0x531069f4741cdead39d70b76e5779863864654fae6db8a752a244ff2f9916c15",
            "0x5eb5cc775c5a446db0f3a1c944e11563b97e6a7e1387b9fb459aa26168f738dc",
            "0xc0338eea778de2a5348824ddbfcec033c7f7cbe18da6da40869562906b63c78c",
            "0x12b05c42ac3209a3c6ffadff4ebb6c3e983e5115f26031d56652815b49a14245",
            "0x249676f3faddb83d64fd101baa3f84a171ae02505d796e3edbf4861038a4b5cc",
            "0x39ddcd9e1a39fa14f25e3f9ec8a86074d05cc0881cbf667df8a6ee70942016fb",
        ],
    },
    ProtocolInfo {
        name: "Panora Exchange",
        addresses: &["0x1c3206329806286fd2223647c9f9b130e66baeb6d7224a18c1f642ffe48f3b4c"],
    },
    ProtocolInfo {
        name: "Mercato",
        addresses: &["0xe11c12ec495f3989c35e1c6a0af414451223305b579291fc8f3d9d0575a23c26"],
    },
    ProtocolInfo {
        name: "BlueMove",
        addresses: &[
            "0xd1fd99c1944b84d1670a2536417e997864ad12303d19eac725891691b04d614e",
            "0x51e68edb69491e23b350d1744cc612e837d26d76bf7b3f7cae2f42fab78f1671",
            "0xd520d8669b0a3de23119898dcdff3e0a27910db247663646ad18cf16e44c6f5",
        ],
    },
];

/// Address → protocol lookup, ordered longest address first so the most
/// specific registration wins when one address is contained in another.
#[derive(Debug)]
pub struct ProtocolRegistry {
    entries: Vec<(String, &'static str)>,
}

impl ProtocolRegistry {
    pub fn new<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (&'static str, &'static str)>,
    {
        let mut entries: Vec<(String, &'static str)> = entries
            .into_iter()
            .map(|(address, name)| (address.to_lowercase(), name))
            .collect();
        // Stable sort keeps registration order among equal lengths.
        entries.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        Self { entries }
    }

    pub fn from_protocols(protocols: &'static [ProtocolInfo]) -> Self {
        Self::new(
            protocols
                .iter()
                .flat_map(|p| p.addresses.iter().map(move |address| (*address, p.name))),
        )
    }

    pub fn resolve(&self, address: &str) -> Option<&'static str> {
        let needle = address.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }

        self.entries
            .iter()
            .find(|(registered, _)| {
                needle.contains(registered.as_str())
                    || (needle.len() >= MIN_TRUNCATED_LEN && registered.contains(&needle))
            })
            .map(|(_, name)| *name)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

static REGISTRY: LazyLock<ProtocolRegistry> =
    LazyLock::new(|| ProtocolRegistry::from_protocols(PROTOCOLS));

/// Display name for an on-chain module address, or `"Unknown"`.
pub fn get_protocol_name(address: &str) -> &'static str {
    REGISTRY.resolve(address).unwrap_or(UNKNOWN_PROTOCOL)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_addresses() {
        assert_eq!(
            get_protocol_name("0x1c3206329806286fd2223647c9f9b130e66baeb6d7224a18c1f642ffe48f3b4c"),
            "Panora Exchange"
        );
        // Upper-cased and padded input still matches.
        assert_eq!(
            get_protocol_name("  0xC6BC659F1649553C1A3FA05D9727433DC03843BAAC29473C817D06D39E7621BA "),
            "Echelon"
        );
    }

    #[test]
    fn resolves_fully_qualified_types() {
        let asset = "0x111ae3e5bc816a5e63c2da97d0aa3886519e0cd5e4b046659fa35796bd11542a::stapt_token::StakedApt";
        assert_eq!(get_protocol_name(asset), "Amnis");
    }

    #[test]
    fn resolves_truncated_addresses() {
        assert_eq!(get_protocol_name("0x6f986d146e4a90b8"), "Thala CDP");
    }

    #[test]
    fn unknown_addresses_get_sentinel() {
        assert_eq!(get_protocol_name(""), UNKNOWN_PROTOCOL);
        assert_eq!(get_protocol_name("0xdeadbeefdeadbeefdeadbeef"), UNKNOWN_PROTOCOL);
        // Too short to be treated as a truncated address.
        assert_eq!(get_protocol_name("0x1"), UNKNOWN_PROTOCOL);
    }

    #[test]
    fn prefers_longest_registered_address() {
        let registry = ProtocolRegistry::new([
            ("0xabcdef0123456789", "Short"),
            ("0xabcdef0123456789aaaabbbbcccc", "Long"),
            ("0xffff", "Other"),
        ]);

        // Substring of both registered addresses.
        assert_eq!(registry.resolve("0xabcdef01234"), Some("Long"));
        // Contains both registered addresses.
        assert_eq!(registry.resolve("0xabcdef0123456789aaaabbbbcccc::pool::Swap"), Some("Long"));
        // Contains only the short one.
        assert_eq!(registry.resolve("0xabcdef0123456789::router"), Some("Short"));
    }

    #[test]
    fn registry_holds_every_address() {
        let expected: usize = PROTOCOLS.iter().map(|p| p.addresses.len()).sum();
        assert_eq!(REGISTRY.len(), expected);
    }
}
