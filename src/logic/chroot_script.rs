//! The configuration script run inside the new system with `arch-chroot`.
//!
//! Every user-supplied value is embedded as a single-quoted shell word, so
//! a quote in a hostname cannot end the string early. Passwords are never
//! part of the script; see [`super::accounts`].

use crate::config::InstallConfig;
use crate::logic::resolver;
use crate::shell::single_quote;

/// Where the script is written, relative to the target root
pub const CHROOT_SCRIPT_PATH: &str = "chroot.sh";

/// Path of the script as seen from inside the chroot
pub const CHROOT_SCRIPT_IN_TARGET: &str = "/chroot.sh";

/// Render the script for `config`.
///
/// `microcode` is the package chosen from the live system's CPU vendor, or
/// `None` to install no microcode.
pub fn render_chroot_script(config: &InstallConfig, microcode: Option<&str>) -> String {
    let tz = single_quote(&format!("/usr/share/zoneinfo/{}", config.timezone));
    let host = single_quote(&config.hostname);
    let fqdn = single_quote(&format!("{}.localdomain", config.hostname));
    let user = single_quote(&config.username);

    let mut lines: Vec<String> = vec![
        "#!/usr/bin/env bash".into(),
        String::new(),
        "set -euo pipefail".into(),
        String::new(),
        format!("ln -sf {} /etc/localtime", tz),
        "hwclock --systohc".into(),
        "sed -i 's/^#en_US.UTF-8 UTF-8/en_US.UTF-8 UTF-8/' /etc/locale.gen".into(),
        "locale-gen".into(),
        "echo \"LANG=en_US.UTF-8\" >> /etc/locale.conf".into(),
        format!("printf '%s\\n' {} > /etc/hostname", host),
        String::new(),
        // Quoted heredoc delimiter: the body is taken literally
        "cat <<'EOF' > /etc/hosts".into(),
        "127.0.0.1 localhost".into(),
        "::1       localhost".into(),
        "EOF".into(),
        format!("printf '127.0.1.1\\t%s\\t%s\\n' {} {} >> /etc/hosts", fqdn, host),
        String::new(),
    ];

    for group in resolver::chroot_package_groups(config.gpu, microcode) {
        lines.push(format!("pacman -S {} --noconfirm --needed", group.join(" ")));
    }
    if microcode.is_none() {
        lines.push("echo \"Warning: Unknown CPU vendor; skipping microcode installation.\"".into());
    }
    lines.push(String::new());

    for service in resolver::SERVICES {
        lines.push(format!("systemctl enable {}", service));
    }
    lines.push(String::new());

    lines.push(format!(
        "useradd -m -G {} {}",
        resolver::user_groups_arg(),
        user
    ));
    lines.push("sed -i 's/^# %wheel ALL=(ALL:ALL) ALL/%wheel ALL=(ALL:ALL) ALL/' /etc/sudoers".into());
    lines.push(String::new());
    lines.push("grub-install --target=x86_64-efi --efi-directory=/boot --bootloader-id=GRUB".into());
    lines.push("grub-mkconfig -o /boot/grub/grub.cfg".into());

    let mut script = lines.join("\n");
    script.push('\n');
    script
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GpuDriver, Secret};

    fn config() -> InstallConfig {
        InstallConfig {
            country: "Iran".into(),
            username: "alice".into(),
            hostname: "archbox".into(),
            user_password: Secret::new("userpw"),
            root_password: Secret::new("rootpw"),
            timezone: "Asia/Tehran".into(),
            gpu: GpuDriver::NvidiaOpen,
            swap_size: "4G".into(),
        }
    }

    #[test]
    fn test_script_header_and_strict_mode() {
        let script = render_chroot_script(&config(), Some("amd-ucode"));
        assert!(script.starts_with("#!/usr/bin/env bash\n"));
        assert!(script.contains("\nset -euo pipefail\n"));
        assert!(script.ends_with("grub-mkconfig -o /boot/grub/grub.cfg\n"));
    }

    #[test]
    fn test_system_settings() {
        let script = render_chroot_script(&config(), Some("amd-ucode"));
        assert!(script.contains("ln -sf '/usr/share/zoneinfo/Asia/Tehran' /etc/localtime\n"));
        assert!(script.contains("hwclock --systohc\n"));
        assert!(script.contains("locale-gen\n"));
        assert!(script.contains("printf '%s\\n' 'archbox' > /etc/hostname\n"));
        assert!(script.contains("'archbox.localdomain' 'archbox' >> /etc/hosts"));
        assert!(script.contains("useradd -m -G wheel,storage,power,audio,video,docker 'alice'\n"));
        assert!(script.contains(
            "grub-install --target=x86_64-efi --efi-directory=/boot --bootloader-id=GRUB\n"
        ));
    }

    #[test]
    fn test_packages_in_order() {
        let script = render_chroot_script(&config(), Some("intel-ucode"));
        let desktop = script.find("hyprland").unwrap();
        let ucode = script.find("pacman -S intel-ucode --noconfirm --needed").unwrap();
        let gpu = script.find("nvidia-open-dkms").unwrap();
        assert!(desktop < ucode && ucode < gpu);
        assert!(!script.contains("Unknown CPU vendor"));
    }

    #[test]
    fn test_unknown_cpu_warns_in_script() {
        let script = render_chroot_script(&config(), None);
        assert!(!script.contains("-ucode"));
        assert!(script.contains("Unknown CPU vendor; skipping microcode installation."));
    }

    #[test]
    fn test_services_enabled_after_packages() {
        let script = render_chroot_script(&config(), None);
        let last_install = script.rfind("pacman -S").unwrap();
        let first_enable = script.find("systemctl enable sddm").unwrap();
        assert!(last_install < first_enable);
        assert!(script.contains("systemctl enable docker\n"));
    }

    #[test]
    fn test_passwords_never_in_script() {
        let script = render_chroot_script(&config(), None);
        assert!(!script.contains("userpw"));
        assert!(!script.contains("rootpw"));
        assert!(!script.contains("chpasswd"));
    }

    #[test]
    fn test_quote_in_value_stays_one_word() {
        let mut cfg = config();
        cfg.hostname = "it's".into();
        let script = render_chroot_script(&cfg, None);
        assert!(script.contains("printf '%s\\n' 'it'\\''s' > /etc/hostname\n"));
    }
}
