pub mod openstack;
