use colored::Colorize;

pub const ADMIN_WARNING: &str = "*** WARNING: Run this as administrator ***";

/// Check if we're running with elevated privileges
#[cfg(windows)]
pub fn is_elevated() -> Result<bool, windows::core::Error> {
    use windows::Win32::Foundation::{CloseHandle, HANDLE};
    use windows::Win32::Security::{GetTokenInformation, TOKEN_ELEVATION, TOKEN_QUERY, TokenElevation};
    use windows::Win32::System::Threading::{GetCurrentProcess, OpenProcessToken};

    unsafe {
        let mut token_handle = HANDLE::default();
        OpenProcessToken(GetCurrentProcess(), TOKEN_QUERY, &mut token_handle)?;

        let mut elevation = TOKEN_ELEVATION::default();
        let mut ret_len = 0u32;
        let res = GetTokenInformation(
            token_handle,
            TokenElevation,
            Some(&mut elevation as *mut _ as *mut std::ffi::c_void),
            std::mem::size_of::<TOKEN_ELEVATION>() as u32,
            &mut ret_len,
        );
        let _ = CloseHandle(token_handle);
        res?;
        Ok(elevation.TokenIsElevated != 0)
    }
}

#[cfg(not(windows))]
pub fn is_elevated() -> Result<bool, std::io::Error> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "elevation can only be checked on Windows",
    ))
}

/// Whether the advisory should be shown. Anything short of a confirmed
/// elevation counts as not elevated.
pub fn needs_admin_warning<E: std::fmt::Display>(check: Result<bool, E>) -> bool {
    match check {
        Ok(elevated) => !elevated,
        Err(e) => {
            log::debug!("could not determine elevation: {}", e);
            true
        }
    }
}

pub fn admin_warning() {
    if needs_admin_warning(is_elevated()) {
        eprintln!("{}", ADMIN_WARNING.yellow().bold());
    }
}
