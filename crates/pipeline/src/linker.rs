//! Library links, established before the dependent module is deployed

use std::collections::HashMap;

use tracing::debug;

use dexboot_core::{Address, ModuleName};

use crate::sequencer::Sequencer;
use crate::Result;

/// Ordered library links per target module
#[derive(Debug, Default)]
pub struct Linker {
    links: HashMap<ModuleName, Vec<(ModuleName, Address)>>,
}

impl Linker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Link `libraries` into `target`, in the given order.
    ///
    /// Every library must already be deployed; nothing is recorded unless all
    /// are. Linking a pair twice is a no-op.
    pub fn link(&mut self, libraries: &[ModuleName], target: &ModuleName, sequencer: &Sequencer) -> Result<()> {
        let resolved = libraries
            .iter()
            .map(|library| Ok((library.clone(), sequencer.require(library, target.as_str())?)))
            .collect::<Result<Vec<_>>>()?;

        let entry = self.links.entry(target.clone()).or_default();
        for (library, address) in resolved {
            if entry.iter().any(|(linked, _)| linked == &library) {
                continue;
            }
            debug!("Linking {} ({:?}) into {}", library, address, target);
            entry.push((library, address));
        }
        Ok(())
    }

    pub fn is_linked(&self, library: &ModuleName, target: &ModuleName) -> bool {
        self.links
            .get(target)
            .map(|links| links.iter().any(|(linked, _)| linked == library))
            .unwrap_or(false)
    }

    /// Links for `target` in link order
    pub fn links_for(&self, target: &ModuleName) -> &[(ModuleName, Address)] {
        self.links.get(target).map(Vec::as_slice).unwrap_or(&[])
    }
}
