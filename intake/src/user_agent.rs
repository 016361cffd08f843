//! Substring-based User-Agent decomposition.
//!
//! Only the families that show up in invitation traffic are recognised. Anything
//! else yields `None`, which record mapping turns into `"Unknown"`.

/// Browser, OS and device fields pulled out of a User-Agent header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UserAgentInfo {
    pub browser: Option<&'static str>,
    pub os: Option<&'static str>,
    /// `"mobile"` or `"tablet"`. Desktops have no type.
    pub device_type: Option<&'static str>,
    pub device_vendor: Option<&'static str>,
}

impl UserAgentInfo {
    pub fn parse(user_agent: &str) -> Self {
        if user_agent.is_empty() {
            return Self::default();
        }

        Self {
            browser: browser(user_agent),
            os: os(user_agent),
            device_type: device_type(user_agent),
            device_vendor: device_vendor(user_agent),
        }
    }
}

fn contains_any(ua: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| ua.contains(needle))
}

fn browser(ua: &str) -> Option<&'static str> {
    // In-app browsers and Chromium derivatives carry a Chrome/Safari token too,
    // so they have to be checked first.
    if ua.contains("Instagram") {
        return Some("Instagram");
    }
    if contains_any(ua, &["FBAN/", "FBAV/"]) {
        return Some("Facebook");
    }
    if ua.contains("SamsungBrowser/") {
        return Some("Samsung Internet");
    }
    if contains_any(ua, &["Edg/", "EdgA/", "EdgiOS/", "Edge/"]) {
        return Some("Edge");
    }
    if contains_any(ua, &["OPR/", "Opera"]) {
        return Some("Opera");
    }
    if contains_any(ua, &["Firefox/", "FxiOS/"]) {
        return Some("Firefox");
    }
    if ua.contains("CriOS/") {
        return Some("Chrome");
    }
    if ua.contains("Chrome/") {
        return if ua.contains("Mobile") {
            Some("Mobile Chrome")
        } else {
            Some("Chrome")
        };
    }
    if contains_any(ua, &["MSIE ", "Trident/"]) {
        return Some("IE");
    }
    if ua.contains("Safari/") && ua.contains("Version/") {
        return if ua.contains("Mobile") {
            Some("Mobile Safari")
        } else {
            Some("Safari")
        };
    }
    None
}

fn os(ua: &str) -> Option<&'static str> {
    // iOS agents say "like Mac OS X" and Android agents say "Linux"
    if ua.contains("Windows") {
        Some("Windows")
    } else if contains_any(ua, &["iPhone", "iPad", "iPod"]) {
        Some("iOS")
    } else if ua.contains("Android") {
        Some("Android")
    } else if ua.contains("CrOS") {
        Some("Chrome OS")
    } else if contains_any(ua, &["Mac OS X", "Macintosh"]) {
        Some("Mac OS")
    } else if ua.contains("Linux") {
        Some("Linux")
    } else {
        None
    }
}

fn device_type(ua: &str) -> Option<&'static str> {
    let android = ua.contains("Android");
    if ua.contains("iPad") || ua.contains("Tablet") || (android && !ua.contains("Mobile")) {
        Some("tablet")
    } else if contains_any(ua, &["Mobi", "iPhone", "iPod"]) || android {
        Some("mobile")
    } else {
        None
    }
}

fn device_vendor(ua: &str) -> Option<&'static str> {
    if contains_any(ua, &["iPhone", "iPad", "iPod", "Macintosh"]) {
        Some("Apple")
    } else if contains_any(ua, &["SM-", "SAMSUNG", "Samsung"]) {
        Some("Samsung")
    } else if ua.contains("Pixel") {
        Some("Google")
    } else if contains_any(ua, &["Redmi", "POCO", "Xiaomi", " Mi "]) {
        Some("Xiaomi")
    } else if ua.contains("OnePlus") {
        Some("OnePlus")
    } else if contains_any(ua, &["HUAWEI", "Huawei"]) {
        Some("Huawei")
    } else if ua.contains("CPH") {
        Some("OPPO")
    } else if ua.contains("vivo") {
        Some("Vivo")
    } else {
        None
    }
}
