// Process-global salt table used for domain separation across the N cipher layers.
//
// hbak_common loads its NodeConfig from a side file at a fixed path on every
// process start. A vault's salt table plays the analogous "must be identical
// across producer and consumer" role, but since it is never user-editable
// (changing a single byte breaks every vault ever written with it), it is
// embedded into the binary at build time rather than read from a runtime
// side-channel file. See DESIGN.md for the tradeoff.

use std::sync::OnceLock;

/// Number of independent cipher layers / derived keys.
pub const N_KEYS: usize = 8;
/// Length in bytes of each salt.
pub const SALT_LEN: usize = 256;

const RAW: &[u8] = include_bytes!("../assets/salts.bin");

/// The process-global, immutable salt table: `N_KEYS` salts of `SALT_LEN` bytes each.
pub struct SaltTable {
    salts: [[u8; SALT_LEN]; N_KEYS],
}

impl SaltTable {
    /// Returns the salt for cipher layer `i`.
    pub fn salt(&self, i: usize) -> &[u8; SALT_LEN] {
        &self.salts[i]
    }
}

static TABLE: OnceLock<SaltTable> = OnceLock::new();

/// Returns the process-global salt table, initializing it on first access.
pub fn table() -> &'static SaltTable {
    TABLE.get_or_init(|| {
        assert_eq!(
            RAW.len(),
            N_KEYS * SALT_LEN,
            "embedded salt table has the wrong size"
        );

        let mut salts = [[0u8; SALT_LEN]; N_KEYS];
        for (i, salt) in salts.iter_mut().enumerate() {
            salt.copy_from_slice(&RAW[i * SALT_LEN..(i + 1) * SALT_LEN]);
        }

        SaltTable { salts }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_loads_exactly_n_keys_salts() {
        let t = table();
        assert_eq!(t.salts.len(), N_KEYS);
    }

    #[test]
    fn salts_are_pairwise_distinct() {
        let t = table();
        for i in 0..N_KEYS {
            for j in (i + 1)..N_KEYS {
                assert_ne!(t.salt(i), t.salt(j));
            }
        }
    }
}
