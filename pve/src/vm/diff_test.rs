#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::vm::types::{CloneSpec, EfiType, NumaNode};

    fn observed(inputs: Inputs) -> Outputs {
        Outputs::from(inputs)
    }

    fn disk(interface: &str, size: u64, file_id: Option<&str>) -> Disk {
        Disk {
            interface: interface.to_string(),
            storage: "local-lvm".to_string(),
            size,
            file_id: file_id.map(str::to_string),
        }
    }

    fn numa(cpus: &str, memory: i64) -> NumaNode {
        NumaNode {
            cpus: cpus.to_string(),
            memory: Some(memory),
            ..Default::default()
        }
    }

    fn host_cpu() -> Cpu {
        Cpu {
            cpu_type: Some("host".to_string()),
            cores: Some(4),
            sockets: Some(1),
            ..Default::default()
        }
    }

    fn efi(file_id: Option<&str>) -> EfiDisk {
        EfiDisk {
            storage: "local-lvm".to_string(),
            file_id: file_id.map(str::to_string),
            efitype: Some(EfiType::Large),
            pre_enrolled_keys: Some(true),
        }
    }

    fn full_state() -> Inputs {
        Inputs {
            vm_id: Some(100),
            node: Some("pve1".to_string()),
            name: Some("web".to_string()),
            memory: Some(2048),
            cpu: Some(host_cpu()),
            efidisk: Some(efi(Some("vm-100-disk-9"))),
            disks: vec![
                disk("scsi0", 32, Some("vm-100-disk-0")),
                disk("scsi1", 8, Some("vm-100-disk-1")),
            ],
            ..Default::default()
        }
    }

    fn names(options: &[ConfigOption]) -> Vec<&str> {
        options.iter().map(|o| o.name.as_str()).collect()
    }

    #[test]
    fn test_identical_configs_have_no_changes() {
        let state = full_state();
        let changes = plan(&state, &observed(state.clone()));
        assert!(!changes.has_changes());
        assert!(!changes.delete_before_replace());
        assert!(changes.directives().is_empty());
        assert_eq!(changes.kind("memory"), ChangeKind::NoChange);
    }

    #[test]
    fn test_vmid_change_requires_replace() {
        let desired = Inputs {
            vm_id: Some(200),
            ..Default::default()
        };
        let changes = plan(
            &desired,
            &observed(Inputs {
                vm_id: Some(100),
                ..Default::default()
            }),
        );
        assert_eq!(changes.kind("vmId"), ChangeKind::Replace);
        assert!(changes.has_changes());
        assert!(changes.delete_before_replace());
        assert!(changes.get("vmId").unwrap().directives.is_empty());
    }

    #[test]
    fn test_absent_vmid_is_computed() {
        let changes = plan(
            &Inputs::default(),
            &observed(Inputs {
                vm_id: Some(100),
                ..Default::default()
            }),
        );
        assert!(!changes.has_changes());
    }

    #[test]
    fn test_scalar_change_is_update_without_replace() {
        let mut desired = full_state();
        desired.name = Some("api".to_string());
        desired.memory = Some(4096);

        let changes = plan(&desired, &observed(full_state()));
        assert_eq!(changes.kind("name"), ChangeKind::Update);
        assert_eq!(changes.kind("memory"), ChangeKind::Update);
        assert!(!changes.delete_before_replace());
        assert_eq!(
            changes.directives(),
            vec![
                ConfigOption::new("name", "api"),
                ConfigOption::new("memory", "4096")
            ]
        );
    }

    #[test]
    fn test_absent_scalars_never_change() {
        let desired = Inputs {
            vm_id: Some(100),
            ..Default::default()
        };
        let changes = plan(&desired, &observed(full_state()));
        assert!(!changes.has_changes());
    }

    #[test]
    fn test_explicitly_cleared_scalar_is_update() {
        let mut state = full_state();
        state.description = Some("old".to_string());
        let mut desired = full_state();
        desired.description = Some(String::new());

        let changes = plan(&desired, &observed(state));
        let change = changes.get("description").unwrap();
        assert_eq!(change.kind, ChangeKind::Update);
        assert_eq!(change.directives, vec![ConfigOption::new("description", "")]);
    }

    #[test]
    fn test_node_change_is_update() {
        let mut desired = full_state();
        desired.node = Some("pve2".to_string());
        let changes = plan(&desired, &observed(full_state()));
        assert_eq!(changes.kind("node"), ChangeKind::Update);
        assert!(changes.directives().is_empty());

        desired.node = None;
        assert_eq!(
            plan(&desired, &observed(full_state())).kind("node"),
            ChangeKind::NoChange
        );
    }

    #[test]
    fn test_cpu_scalar_change_is_scoped() {
        let mut desired = full_state();
        desired.cpu.as_mut().unwrap().cores = Some(8);

        let changes = plan(&desired, &observed(full_state()));
        assert_eq!(changes.kind("cores"), ChangeKind::Update);
        assert_eq!(changes.kind("cpu"), ChangeKind::NoChange);
        assert_eq!(changes.directives(), vec![ConfigOption::new("cores", "8")]);
    }

    #[test]
    fn test_cpu_scalar_absent_in_desired_is_no_change() {
        let mut desired = full_state();
        desired.cpu.as_mut().unwrap().cores = None;
        assert!(!plan(&desired, &observed(full_state())).has_changes());
    }

    #[test]
    fn test_cpu_numa_flag_encodes_as_int() {
        let mut desired = full_state();
        desired.cpu.as_mut().unwrap().numa = Some(true);
        let mut state = full_state();
        state.cpu.as_mut().unwrap().numa = Some(false);

        let changes = plan(&desired, &observed(state));
        assert_eq!(changes.directives(), vec![ConfigOption::new("numa", "1")]);
    }

    #[test]
    fn test_cpu_descriptor_change_reencodes_whole_string() {
        let mut desired = full_state();
        {
            let cpu = desired.cpu.as_mut().unwrap();
            cpu.cpu_type = Some("kvm64".to_string());
            cpu.flags_enabled = vec!["aes".to_string()];
            cpu.flags_disabled = vec!["pcid".to_string()];
            cpu.hidden = Some(true);
        }

        let changes = plan(&desired, &observed(full_state()));
        let change = changes.get("cpu").unwrap();
        assert_eq!(change.kind, ChangeKind::Update);
        assert_eq!(
            change.directives,
            vec![ConfigOption::new("cpu", "kvm64,flags=+aes;-pcid,hidden=1")]
        );
        assert_eq!(changes.kind("cores"), ChangeKind::NoChange);
    }

    #[test]
    fn test_cpu_flag_added_reencodes_descriptor() {
        let mut state = full_state();
        state.cpu.as_mut().unwrap().flags_enabled = vec!["aes".to_string()];
        let mut desired = full_state();
        desired.cpu.as_mut().unwrap().flags_enabled = vec!["aes".to_string(), "avx2".to_string()];

        let changes = plan(&desired, &observed(state));
        assert_eq!(
            changes.get("cpu").unwrap().directives,
            vec![ConfigOption::new("cpu", "host,flags=+aes;+avx2")]
        );
    }

    #[test]
    fn test_numa_nodes_added_changed_and_removed() {
        let mut state = full_state();
        state.cpu.as_mut().unwrap().numa_nodes = vec![numa("0-1", 1024), numa("2-3", 1024), numa("4-5", 1024)];
        let mut desired = full_state();
        desired.cpu.as_mut().unwrap().numa_nodes = vec![numa("0-1", 1024), numa("2-3", 2048)];

        let changes = plan(&desired, &observed(state));
        assert_eq!(changes.kind("numa0"), ChangeKind::NoChange);
        assert_eq!(changes.kind("numa1"), ChangeKind::Update);
        assert_eq!(changes.kind("numa2"), ChangeKind::Update);
        assert_eq!(
            changes.directives(),
            vec![
                ConfigOption::new("numa1", "cpus=2-3,memory=2048"),
                ConfigOption::delete("numa2"),
            ]
        );
    }

    #[test]
    fn test_numa_nodes_added_to_cpu_without_nodes() {
        let mut desired = full_state();
        desired.cpu.as_mut().unwrap().numa_nodes = vec![numa("0-1", 1024), numa("2-3", 1024)];

        let changes = plan(&desired, &observed(full_state()));
        assert_eq!(
            names(&changes.directives()),
            vec!["numa0", "numa1"]
        );
    }

    #[test]
    fn test_directive_emission_order() {
        let mut desired = full_state();
        desired.memory = Some(8192);
        {
            let cpu = desired.cpu.as_mut().unwrap();
            cpu.cpu_type = Some("kvm64".to_string());
            cpu.cores = Some(16);
            cpu.vcpus = Some(8);
            cpu.numa_nodes = vec![numa("0-7", 4096)];
        }
        desired.disks[0].size = 64;

        let changes = plan(&desired, &observed(full_state()));
        assert_eq!(
            names(&changes.directives()),
            vec!["memory", "cores", "vcpus", "cpu", "numa0", "scsi0", "scsi1"]
        );
    }

    #[test]
    fn test_disk_file_id_is_ignored_when_not_requested() {
        let mut desired = full_state();
        for disk in &mut desired.disks {
            disk.file_id = None;
        }
        assert_eq!(
            plan(&desired, &observed(full_state())).kind("disks"),
            ChangeKind::NoChange
        );

        desired.disks[1].file_id = Some("other-volume".to_string());
        assert_eq!(
            plan(&desired, &observed(full_state())).kind("disks"),
            ChangeKind::Update
        );
    }

    #[test]
    fn test_disk_change_reemits_whole_list() {
        let mut desired = full_state();
        desired.disks[1].size = 16;

        let changes = plan(&desired, &observed(full_state()));
        let change = changes.get("disks").unwrap();
        assert_eq!(change.kind, ChangeKind::Update);
        assert_eq!(
            change.directives,
            vec![
                ConfigOption::new("scsi0", "file=local-lvm:vm-100-disk-0,size=32"),
                ConfigOption::new("scsi1", "file=local-lvm:vm-100-disk-1,size=16"),
            ]
        );
    }

    #[test]
    fn test_disk_reorder_and_removal_are_updates() {
        let mut desired = full_state();
        desired.disks.swap(0, 1);
        assert_eq!(
            plan(&desired, &observed(full_state())).kind("disks"),
            ChangeKind::Update
        );

        let mut desired = full_state();
        desired.disks.pop();
        assert_eq!(
            plan(&desired, &observed(full_state())).kind("disks"),
            ChangeKind::Update
        );
    }

    #[test]
    fn test_efidisk_added_and_removed() {
        let mut state = full_state();
        state.efidisk = None;
        let changes = plan(&full_state(), &observed(state));
        assert_eq!(changes.kind("efidisk"), ChangeKind::Update);
        assert_eq!(
            changes.directives(),
            vec![ConfigOption::new(
                "efidisk0",
                "file=local-lvm:vm-100-disk-9,efitype=4m,pre-enrolled-keys=1"
            )]
        );

        let mut desired = full_state();
        desired.efidisk = None;
        let changes = plan(&desired, &observed(full_state()));
        assert_eq!(changes.kind("efidisk"), ChangeKind::Update);
        assert_eq!(changes.directives(), vec![ConfigOption::delete("efidisk0")]);
    }

    #[test]
    fn test_removals_share_one_delete_directive() {
        let mut state = full_state();
        state.cpu.as_mut().unwrap().numa_nodes = vec![numa("0-1", 1024), numa("2-3", 1024)];
        let mut desired = full_state();
        desired.cpu.as_mut().unwrap().numa_nodes.clear();
        desired.efidisk = None;
        desired.memory = Some(8192);

        let changes = plan(&desired, &observed(state));
        assert_eq!(changes.kind("numa0"), ChangeKind::Update);
        assert_eq!(changes.kind("numa1"), ChangeKind::Update);
        assert_eq!(changes.kind("efidisk"), ChangeKind::Update);

        let directives = changes.directives();
        assert_eq!(directives.iter().filter(|d| d.name == "delete").count(), 1);
        assert_eq!(
            directives,
            vec![
                ConfigOption::new("memory", 8192),
                ConfigOption::delete("numa0,numa1,efidisk0"),
            ]
        );
    }

    #[test]
    fn test_efidisk_granular_changes() {
        let mut desired = full_state();
        {
            let efi = desired.efidisk.as_mut().unwrap();
            efi.efitype = Some(EfiType::Small);
            efi.pre_enrolled_keys = Some(false);
        }

        let changes = plan(&desired, &observed(full_state()));
        assert_eq!(changes.kind("efidisk.efitype"), ChangeKind::Update);
        assert_eq!(changes.kind("efidisk.preEnrolledKeys"), ChangeKind::Update);
        assert_eq!(changes.kind("efidisk.storage"), ChangeKind::NoChange);
        assert!(changes.get("efidisk").is_none());
        assert!(!changes.delete_before_replace());
        assert_eq!(
            changes.directives(),
            vec![ConfigOption::new(
                "efidisk0",
                "file=local-lvm:vm-100-disk-9,efitype=2m,pre-enrolled-keys=0"
            )]
        );
    }

    #[test]
    fn test_efidisk_file_id_only_compared_when_set() {
        let mut desired = full_state();
        desired.efidisk.as_mut().unwrap().file_id = None;
        assert_eq!(
            plan(&desired, &observed(full_state())).kind("efidisk"),
            ChangeKind::NoChange
        );

        desired.efidisk.as_mut().unwrap().file_id = Some("vm-100-disk-7".to_string());
        assert_eq!(
            plan(&desired, &observed(full_state())).kind("efidisk.fileId"),
            ChangeKind::Update
        );
    }

    #[test]
    fn test_clone_change_is_update_without_directives() {
        let mut desired = full_state();
        desired.clone = Some(CloneSpec {
            vm_id: 9000,
            ..Default::default()
        });
        let changes = plan(&desired, &observed(full_state()));
        assert_eq!(changes.kind("clone"), ChangeKind::Update);
        assert!(changes.directives().is_empty());
    }

    #[test]
    fn test_changes_are_recorded_in_order() {
        let changes = plan(&full_state(), &observed(full_state()));
        let recorded: Vec<&str> = changes.changes().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(recorded.first(), Some(&"vmId"));
        assert_eq!(recorded.last(), Some(&"clone"));
        let cores = recorded.iter().position(|n| *n == "cores").unwrap();
        let cpu = recorded.iter().position(|n| *n == "cpu").unwrap();
        let disks = recorded.iter().position(|n| *n == "disks").unwrap();
        assert!(cores < cpu && cpu < disks);
    }
}
