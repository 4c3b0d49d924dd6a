use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Synchronous exception causes raised by address translation, with their
/// architectural mcause encodings.
#[repr(u64)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, IntoPrimitive)]
pub enum ExceptionCause {
    InstPageFault = 12,
    LoadPageFault = 13,
    StorePageFault = 15,
}

#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, PartialOrd, Ord, Eq, TryFromPrimitive)]
pub enum PrivilegeMode {
    User = 0,
    Supervisor = 1,
    Machine = 3,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn cause_encodings() {
        assert_eq!(u64::from(ExceptionCause::InstPageFault), 12);
        assert_eq!(u64::from(ExceptionCause::LoadPageFault), 13);
        assert_eq!(u64::from(ExceptionCause::StorePageFault), 15);
    }

    #[test]
    fn privilege_from_bits() {
        assert_eq!(PrivilegeMode::try_from(0u8), Ok(PrivilegeMode::User));
        assert_eq!(PrivilegeMode::try_from(1u8), Ok(PrivilegeMode::Supervisor));
        assert_eq!(PrivilegeMode::try_from(3u8), Ok(PrivilegeMode::Machine));
        assert!(PrivilegeMode::try_from(2u8).is_err());
    }
}
