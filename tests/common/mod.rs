//! Scripted device platform shared by the integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;

use tpm2_policy::crypto::hash;
use tpm2_policy::error::Result;
use tpm2_policy::{
    DeviceTime, HashAlg, Hierarchy, PcrSelectionList, Platform, PolicyError, ResetCounters,
};
use zeroize::Zeroizing;

pub struct MockPlatform {
    pub time: DeviceTime,
    pub counters: ResetCounters,
    /// index -> (name, data)
    pub nv: BTreeMap<u32, (Vec<u8>, Vec<u8>)>,
    /// pcr index -> current value; unset PCRs read as 32 zero bytes.
    pub pcr_values: BTreeMap<usize, Vec<u8>>,
    /// PCRs at or above this index are unimplemented and get filtered out
    /// of caller selections.
    pub implemented_pcrs: usize,
    pub capabilities: BTreeMap<(u32, u32), Vec<u8>>,
    /// Signature accepted for any key; everything else is rejected.
    pub good_signature: Vec<u8>,
    pub secret_seed: Vec<u8>,
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self {
            time: DeviceTime {
                millis: 60_000,
                clock_millis: 2_000_000,
                epoch: 1,
                advancing: true,
                clock_safe: true,
            },
            counters: ResetCounters {
                pcr_generation: 7,
                total_resets: 2,
                restarts: 0,
            },
            nv: BTreeMap::new(),
            pcr_values: BTreeMap::new(),
            implemented_pcrs: 24,
            capabilities: BTreeMap::new(),
            good_signature: vec![0x51; 64],
            secret_seed: vec![0x77; 32],
        }
    }
}

impl MockPlatform {
    fn pcr_value(&self, index: usize) -> Vec<u8> {
        self.pcr_values
            .get(&index)
            .cloned()
            .unwrap_or_else(|| vec![0u8; 32])
    }
}

impl Platform for MockPlatform {
    fn read_device_time(&self) -> Result<DeviceTime> {
        Ok(self.time)
    }

    fn read_reset_counters(&self) -> Result<ResetCounters> {
        Ok(self.counters)
    }

    fn read_nv_bytes(&self, index: u32, offset: u16, len: u16) -> Result<Vec<u8>> {
        let (_, data) = self.nv.get(&index).ok_or(PolicyError::OperandOutOfRange {
            offset: 0,
            len: 0,
            bound: 0,
        })?;
        let start = offset as usize;
        data.get(start..start + len as usize)
            .map(<[u8]>::to_vec)
            .ok_or(PolicyError::OperandOutOfRange {
                offset: start,
                len: len as usize,
                bound: data.len(),
            })
    }

    fn read_nv_name(&self, index: u32) -> Result<Vec<u8>> {
        self.nv
            .get(&index)
            .map(|(name, _)| name.clone())
            .ok_or(PolicyError::OperandOutOfRange {
                offset: 0,
                len: 0,
                bound: 0,
            })
    }

    fn read_pcr_digest(&self, selection: &mut PcrSelectionList, alg: HashAlg) -> Result<Vec<u8>> {
        let mut concatenated = Vec::new();
        for sel in &mut selection.selections {
            for pcr in 0..sel.bitmap.len() * 8 {
                if !sel.is_selected(pcr) {
                    continue;
                }
                if pcr >= self.implemented_pcrs {
                    sel.bitmap[pcr / 8] &= !(1 << (pcr % 8));
                    continue;
                }
                concatenated.extend_from_slice(&self.pcr_value(pcr));
            }
        }
        Ok(hash(alg, &concatenated))
    }

    fn verify_signature(&self, _key_name: &[u8], _digest: &[u8], signature: &[u8]) -> Result<()> {
        if signature == self.good_signature {
            Ok(())
        } else {
            Err(PolicyError::SignatureInvalid)
        }
    }

    fn read_capability(&self, capability: u32, property: u32) -> Result<Option<Vec<u8>>> {
        Ok(self.capabilities.get(&(capability, property)).cloned())
    }

    fn command_implemented(&self, _code: u16) -> bool {
        true
    }

    fn hierarchy_secret(&self, hierarchy: Hierarchy) -> Result<Zeroizing<Vec<u8>>> {
        let mut secret = self.secret_seed.clone();
        secret.push(match hierarchy {
            Hierarchy::Owner => 0x01,
            Hierarchy::Endorsement => 0x02,
            Hierarchy::Platform => 0x03,
            Hierarchy::Null => 0x04,
        });
        Ok(Zeroizing::new(secret))
    }
}
