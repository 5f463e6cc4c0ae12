pub mod codec;
pub mod computed;
pub mod convert;
pub mod diff;
pub mod options;
pub mod resource;
pub mod types;

pub use computed::{
    copy_missing_file_ids, outputs_with_computed_from_state, reconcile, reconcile_inputs,
    reconcile_observed, Reconciled,
};
pub use convert::{reconcile_disk_order, vm_to_inputs};
pub use diff::{plan, ChangeKind, ChangeSet, FieldChange};
pub use options::build_options;
pub use resource::VmResource;
pub use types::{CloneSpec, Cpu, Disk, EfiDisk, EfiType, Inputs, NumaNode, Outputs};
