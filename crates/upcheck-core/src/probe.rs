//! Diagnostic probes captured into every snapshot.

use serde::{Deserialize, Serialize};

/// The fixed set of diagnostic commands run on the host before and after an upgrade.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Probe {
    /// Installed imgbased package.
    ImgbasedVer,

    /// Installed update package (image-update rpm).
    UpdateVer,

    /// `imgbase w`: the layer the host booted into.
    ImgbaseW,

    /// `imgbase layout`: base/layer tree.
    ImgbaseLayout,

    /// iSCSI initiator name file.
    InitiatornameIscsi,

    /// Logical volume names and sizes in megabytes.
    Lvs,

    /// Mounted filesystems in raw form.
    Findmnt,
}

impl Probe {
    /// Every probe, in collection order.
    pub const ALL: [Probe; 7] = [
        Probe::ImgbasedVer,
        Probe::UpdateVer,
        Probe::ImgbaseW,
        Probe::ImgbaseLayout,
        Probe::InitiatornameIscsi,
        Probe::Lvs,
        Probe::Findmnt,
    ];

    /// Get the probe name as a string.
    pub fn name(&self) -> &'static str {
        match self {
            Probe::ImgbasedVer => "imgbased_ver",
            Probe::UpdateVer => "update_ver",
            Probe::ImgbaseW => "imgbase_w",
            Probe::ImgbaseLayout => "imgbase_layout",
            Probe::InitiatornameIscsi => "initiatorname_iscsi",
            Probe::Lvs => "lvs",
            Probe::Findmnt => "findmnt",
        }
    }

    /// Get the shell command that produces this probe's output.
    pub fn command(&self) -> &'static str {
        match self {
            Probe::ImgbasedVer => "rpm -qa | grep --color=never imgbased",
            Probe::UpdateVer => "rpm -qa | grep --color=never update",
            Probe::ImgbaseW => "imgbase w",
            Probe::ImgbaseLayout => "imgbase layout",
            Probe::InitiatornameIscsi => "cat /etc/iscsi/initiatorname.iscsi",
            Probe::Lvs => "lvs -a -o lv_name,lv_size --unit=m --noheadings --separator ' '",
            Probe::Findmnt => "findmnt -r -n",
        }
    }

    /// Look a probe up by its name.
    pub fn from_name(name: &str) -> Option<Probe> {
        Probe::ALL.into_iter().find(|p| p.name() == name)
    }
}

impl std::fmt::Display for Probe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
