use chaincore::network::Message;
use tokio::net::TcpStream;

pub async fn handle_connection(mut socket: TcpStream) {
    loop {
        let message = match Message::receive_async(&mut socket).await {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(error = %e, "invalid message from peer, closing connection");
                return;
            }
        };

        use Message::*;
        match message {
            NodeList(_) | Difference(_) | Utxos(_) | TemplateValidity(_) | Template(_) => {
                tracing::error!("a node never expects a reply variant as a request; closing connection");
                return;
            }

            FetchBlock(height) => {
                let block = {
                    let blockchain = crate::BLOCKCHAIN.read().await;
                    let found = blockchain.blocks().nth(height as usize).cloned();
                    found
                };
                let Some(block) = block else { return };
                if NewBlock(block).send_async(&mut socket).await.is_err() {
                    return;
                }
            }

            DiscoverNodes => {
                let nodes = crate::NODES.iter().map(|x| x.key().clone()).collect();
                if NodeList(nodes).send_async(&mut socket).await.is_err() {
                    return;
                }
            }

            AskDifference(height) => {
                let difference = {
                    let blockchain = crate::BLOCKCHAIN.read().await;
                    blockchain.block_height() as i64 - height as i64
                };
                if Difference(difference).send_async(&mut socket).await.is_err() {
                    return;
                }
            }

            FetchUtxos(address) => {
                let owned = {
                    let blockchain = crate::BLOCKCHAIN.read().await;
                    let pool = crate::POOL.read().await;
                    blockchain
                        .utxos()
                        .iter()
                        .filter(|(_, output)| output.to_address == address)
                        .map(|(key, output)| (*key, output.clone(), pool.reserves(*key)))
                        .collect::<Vec<_>>()
                };
                if Utxos(owned).send_async(&mut socket).await.is_err() {
                    return;
                }
            }

            NewBlock(block) => {
                let mut blockchain = crate::BLOCKCHAIN.write().await;
                let mut pool = crate::POOL.write().await;
                if !blockchain.add_block(block, &mut pool) {
                    tracing::warn!("rejected block");
                }
            }

            NewTransaction(tx) => {
                let blockchain = crate::BLOCKCHAIN.read().await;
                let mut pool = crate::POOL.write().await;
                if let Err(e) = blockchain.handle_received_transaction(tx, &mut pool) {
                    tracing::warn!(error = %e, "rejected transaction, closing connection");
                    return;
                }
            }

            ValidateTemplate(template) => {
                let valid = {
                    let blockchain = crate::BLOCKCHAIN.read().await;
                    template.previous_hash == Some(blockchain.get_latest().hash)
                };
                if TemplateValidity(valid).send_async(&mut socket).await.is_err() {
                    return;
                }
            }

            SubmitTemplate(block) => {
                tracing::info!(index = block.index, "received allegedly mined block");
                let accepted = {
                    let mut blockchain = crate::BLOCKCHAIN.write().await;
                    let mut pool = crate::POOL.write().await;
                    blockchain.add_block(block.clone(), &mut pool)
                };
                if !accepted {
                    tracing::warn!(index = block.index, "rejected submitted block, closing connection");
                    return;
                }
                broadcast(NewBlock(block)).await;
            }

            SubmitTransaction(tx) => {
                let accepted = {
                    let blockchain = crate::BLOCKCHAIN.read().await;
                    let mut pool = crate::POOL.write().await;
                    match blockchain.handle_received_transaction(tx.clone(), &mut pool) {
                        Ok(()) => true,
                        Err(e) => {
                            tracing::warn!(error = %e, "rejected submitted transaction, closing connection");
                            false
                        }
                    }
                };
                if !accepted {
                    return;
                }
                broadcast(NewTransaction(tx)).await;
            }

            FetchTemplate(address) => {
                let template = {
                    let blockchain = crate::BLOCKCHAIN.read().await;
                    let pool = crate::POOL.read().await;
                    blockchain.build_template(address, &pool)
                };
                if Template(template).send_async(&mut socket).await.is_err() {
                    return;
                }
            }
        }
    }
}

async fn broadcast(message: Message) {
    let peers: Vec<String> = crate::NODES.iter().map(|x| x.key().clone()).collect();
    for peer in peers {
        if let Some(mut stream) = crate::NODES.get_mut(&peer) {
            if message.send_async(&mut *stream).await.is_err() {
                tracing::warn!(peer, "failed to relay message");
            }
        }
    }
}
