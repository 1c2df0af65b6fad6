pub mod account;
pub mod subscription;
pub mod virtual_machine;
pub mod vm_image;
pub mod vm_region;
pub mod vm_size;
