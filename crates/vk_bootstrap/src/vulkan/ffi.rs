//! Native string marshalling for layer and extension names
//!
//! Create-info structs take `*const *const c_char` name arrays. `NameList` owns both the
//! NUL-terminated strings and the pointer array, so the pointers stay valid for as long as the
//! list is in scope and are released together when it goes out of scope.

use std::ffi::{c_char, CString};

use crate::vulkan::error::{VulkanError, VulkanResult};

/// Owned set of C strings plus the pointer array handed to the driver
#[derive(Debug, Default)]
pub struct NameList {
    names: Vec<CString>,
    pointers: Vec<*const c_char>,
}

impl NameList {
    /// Build a list from UTF-8 names, failing on interior NUL bytes
    pub fn from_strs<I, S>(names: I) -> VulkanResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names = names
            .into_iter()
            .map(|name| {
                CString::new(name.as_ref())
                    .map_err(|_| VulkanError::InvalidName(name.as_ref().to_string()))
            })
            .collect::<VulkanResult<Vec<_>>>()?;
        // CString data lives on the heap, so moving the Vec does not invalidate these pointers
        let pointers = names.iter().map(|name| name.as_ptr()).collect();
        Ok(Self { names, pointers })
    }

    /// Pointer array for `enabled_*_names`
    pub fn as_ptrs(&self) -> &[*const c_char] {
        &self.pointers
    }

    /// Number of names
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the list is empty
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Names as Rust strings, for logging
    pub fn to_strings(&self) -> Vec<String> {
        self.names
            .iter()
            .map(|name| name.to_string_lossy().into_owned())
            .collect()
    }
}

/// Read a fixed-size, NUL-terminated name array returned by the driver
pub fn fixed_name_to_string(raw: &[c_char]) -> String {
    let bytes: Vec<u8> = raw
        .iter()
        .take_while(|&&c| c != 0)
        .map(|&c| c as u8)
        .collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;

    #[test]
    fn test_pointers_reference_owned_names() {
        let list = NameList::from_strs(["VK_KHR_surface", "VK_KHR_xcb_surface"]).unwrap();
        assert_eq!(list.len(), 2);
        let first = unsafe { CStr::from_ptr(list.as_ptrs()[0]) };
        assert_eq!(first.to_str().unwrap(), "VK_KHR_surface");
        let second = unsafe { CStr::from_ptr(list.as_ptrs()[1]) };
        assert_eq!(second.to_str().unwrap(), "VK_KHR_xcb_surface");
    }

    #[test]
    fn test_interior_nul_is_rejected() {
        let err = NameList::from_strs(["bad\0name"]).unwrap_err();
        assert_eq!(err, VulkanError::InvalidName("bad\0name".to_string()));
    }

    #[test]
    fn test_fixed_name_stops_at_nul() {
        let mut raw = [0 as c_char; 16];
        for (slot, byte) in raw.iter_mut().zip(b"VK_KHR_swapchain".iter().take(15)) {
            *slot = *byte as c_char;
        }
        assert_eq!(fixed_name_to_string(&raw), "VK_KHR_swapchai");

        let empty = [0 as c_char; 4];
        assert!(fixed_name_to_string(&empty).is_empty());
    }
}
