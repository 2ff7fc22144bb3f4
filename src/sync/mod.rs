pub mod broadcast;
pub mod packet;
pub mod receive;
