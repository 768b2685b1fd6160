//! The store layer: recipient ACLs, the sub-store engine, the
//! multi-store root, and the merged tree view.

pub mod acl;
pub mod reencrypt;
pub mod root;
pub mod sub;
pub mod tree;

pub use acl::{AclStore, Recipients};
pub use root::RootStore;
pub use sub::{RecipientConfirm, SubStore};
pub use tree::{ContentType, Tree, TreeNode};
