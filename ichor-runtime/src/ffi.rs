//! C ABI exports.
//!
//! Generated code links against the static library and calls the scalar
//! collaborators through these symbols. Strings cross the boundary as
//! NUL-terminated UTF-8; strings returned by the runtime must be released
//! with [`ichor_string_free`].

use std::ffi::{c_char, CStr, CString};
use std::ptr;

use crate::bits::Bits;
use crate::os;

// Bits

#[no_mangle]
pub extern "C" fn ichor_bits_is_power_of_two32(x: u32) -> bool {
    x.is_pow2()
}

#[no_mangle]
pub extern "C" fn ichor_bits_is_power_of_two64(x: u64) -> bool {
    x.is_pow2()
}

#[no_mangle]
pub extern "C" fn ichor_bits_rotl32(x: u32, n: u32) -> u32 {
    x.rotl(n)
}

#[no_mangle]
pub extern "C" fn ichor_bits_rotr32(x: u32, n: u32) -> u32 {
    x.rotr(n)
}

#[no_mangle]
pub extern "C" fn ichor_bits_rotl64(x: u64, n: u32) -> u64 {
    x.rotl(n)
}

#[no_mangle]
pub extern "C" fn ichor_bits_rotr64(x: u64, n: u32) -> u64 {
    x.rotr(n)
}

#[no_mangle]
pub extern "C" fn ichor_bits_clz32(x: u32) -> u32 {
    x.clz()
}

#[no_mangle]
pub extern "C" fn ichor_bits_ctz32(x: u32) -> u32 {
    x.ctz()
}

#[no_mangle]
pub extern "C" fn ichor_bits_clz64(x: u64) -> u32 {
    x.clz()
}

#[no_mangle]
pub extern "C" fn ichor_bits_ctz64(x: u64) -> u32 {
    x.ctz()
}

#[no_mangle]
pub extern "C" fn ichor_bits_has_zero_byte32(x: u32) -> bool {
    x.has_zero_byte()
}

#[no_mangle]
pub extern "C" fn ichor_bits_has_zero_byte64(x: u64) -> bool {
    x.has_zero_byte()
}

#[no_mangle]
pub extern "C" fn ichor_bits_popcount32(x: u32) -> u32 {
    x.pop_count()
}

#[no_mangle]
pub extern "C" fn ichor_bits_popcount64(x: u64) -> u32 {
    x.pop_count()
}

#[no_mangle]
pub extern "C" fn ichor_bits_bswap32(x: u32) -> u32 {
    x.byte_swap()
}

#[no_mangle]
pub extern "C" fn ichor_bits_bswap64(x: u64) -> u64 {
    x.byte_swap()
}

#[no_mangle]
pub extern "C" fn ichor_bits_parity32(x: u32) -> u32 {
    x.parity()
}

#[no_mangle]
pub extern "C" fn ichor_bits_parity64(x: u64) -> u32 {
    x.parity()
}

// Files

/// Status returned when a string argument or result cannot cross the boundary.
const INVALID_STRING: i32 = -1;

/// # Safety
///
/// `ptr` must be null or point to a NUL-terminated string valid for the call.
unsafe fn borrow_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    // SAFETY: non-null and NUL-terminated per the caller's contract.
    unsafe { CStr::from_ptr(ptr) }.to_str().ok()
}

/// Read a text file into a newly allocated string.
///
/// Returns `0` and stores the string in `*out` on success. On failure,
/// returns the platform error code and stores null.
///
/// # Safety
///
/// `path` must be a valid NUL-terminated string and `out` a valid pointer.
#[no_mangle]
pub unsafe extern "C" fn ichor_os_read_text_file(path: *const c_char, out: *mut *mut c_char) -> i32 {
    if out.is_null() {
        return INVALID_STRING;
    }
    // SAFETY: `out` is non-null and valid per the caller's contract.
    unsafe { out.write(ptr::null_mut()) };
    // SAFETY: forwarded caller contract.
    let Some(path) = (unsafe { borrow_str(path) }) else {
        return INVALID_STRING;
    };
    match os::read_text_file(path) {
        Ok(text) => match CString::new(text) {
            Ok(text) => {
                // SAFETY: as above.
                unsafe { out.write(text.into_raw()) };
                0
            }
            Err(_) => INVALID_STRING,
        },
        Err(err) => err.code(),
    }
}

/// Write `content` to a text file, creating or truncating it.
///
/// Returns `0` on success or the platform error code.
///
/// # Safety
///
/// `path` and `content` must be valid NUL-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn ichor_os_write_text_file(path: *const c_char, content: *const c_char) -> i32 {
    // SAFETY: forwarded caller contract.
    let (Some(path), Some(content)) = (unsafe { borrow_str(path) }, unsafe { borrow_str(content) }) else {
        return INVALID_STRING;
    };
    os::status_code(&os::write_text_file(path, content))
}

/// Release a string returned by the runtime.
///
/// # Safety
///
/// `s` must be null or a pointer obtained from this library that has not
/// been released yet.
#[no_mangle]
pub unsafe extern "C" fn ichor_string_free(s: *mut c_char) {
    if !s.is_null() {
        // SAFETY: ownership returns from the caller per the contract.
        drop(unsafe { CString::from_raw(s) });
    }
}
