use crate::Workspace;
use anyhow::Result;
use camino::Utf8Path;

pub fn handle_list(ws: &Workspace) -> Result<()> {
    let folders = ws.registry.list()?;

    if folders.is_empty() {
        println!("No folders registered.");
        return Ok(());
    }

    println!("{:<24} {:<38} {:<40}", "NAME", "ID", "PATH");
    println!("{:-<24} {:-<38} {:-<40}", "", "", "");
    for f in folders {
        println!("{:<24} {:<38} {:<40}", f.name, f.id, f.base_path);
    }

    Ok(())
}

pub fn handle_add(ws: &Workspace, name: &str, path: &Utf8Path) -> Result<()> {
    let folder = ws.registry.register(name, path)?;
    println!("Folder '{}' tracks {}.", folder.name, folder.base_path);
    Ok(())
}

/// Files on disk are left alone; only the registration and its metadata go.
pub fn handle_remove(ws: &Workspace, name: &str) -> Result<()> {
    let folder = ws.registry.unregister(name)?;
    println!("Folder '{}' removed ({} untouched).", folder.name, folder.base_path);
    Ok(())
}

pub fn handle_set_peer(ws: &Workspace, address: &str) -> Result<()> {
    ws.registry.set_peer_address(address)?;
    println!("Peer set to {}.", address.trim());
    Ok(())
}

pub fn handle_show_peer(ws: &Workspace) -> Result<()> {
    match ws.registry.peer_address()? {
        Some(addr) => println!("{addr}"),
        None => println!("No peer configured (run `tether peer set <host:port>`)."),
    }
    Ok(())
}
